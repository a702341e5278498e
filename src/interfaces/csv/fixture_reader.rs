use crate::domain::gateway::GatewayState;
use crate::domain::sponsorship::{
    Sponsorship, SponsorshipId, SponsorshipStatus, SponsorshipType, UserId,
};
use crate::domain::user::User;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::marker::PhantomData;

/// One row of a sponsorship fixture.
///
/// `gateway` optionally overrides the state the simulated gateway holds for
/// the subscription; when empty the gateway mirrors `status`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SponsorshipRow {
    pub id: SponsorshipId,
    pub public_id: String,
    pub sponsor_id: UserId,
    pub sponsored_explorer_id: UserId,
    pub r#type: SponsorshipType,
    pub status: SponsorshipStatus,
    pub amount: Decimal,
    pub external_subscription_id: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gateway: Option<GatewayState>,
}

impl SponsorshipRow {
    pub fn into_parts(self) -> (Sponsorship, Option<GatewayState>) {
        let sponsorship = Sponsorship {
            id: self.id,
            public_id: self.public_id,
            sponsor_id: self.sponsor_id,
            sponsored_explorer_id: self.sponsored_explorer_id,
            r#type: self.r#type,
            status: self.status,
            amount: self.amount,
            external_subscription_id: self.external_subscription_id.filter(|id| !id.is_empty()),
            deleted_at: self.deleted_at,
        };
        (sponsorship, self.gateway)
    }
}

/// Reads fixture records from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating short rows, and
/// yields one `Result` per record so a malformed line does not stop the load.
pub struct FixtureReader<R: Read, T> {
    reader: csv::Reader<R>,
    _record: PhantomData<T>,
}

pub type SponsorshipReader<R> = FixtureReader<R, SponsorshipRow>;
pub type UserReader<R> = FixtureReader<R, User>;

impl<R: Read, T: DeserializeOwned> FixtureReader<R, T> {
    /// Creates a new reader from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self {
            reader,
            _record: PhantomData,
        }
    }

    /// Lazily reads and deserializes records.
    pub fn records(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LifecycleError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "id,public_id,sponsor_id,sponsored_explorer_id,type,status,amount,external_subscription_id,deleted_at,gateway";

    #[test]
    fn test_reader_valid_sponsorships() {
        let data = format!(
            "{HEADER}\n\
             1, sp_1, 10, 1, subscription, paused, 5.00, sub_1, , missing\n\
             2, sp_2, 11, 1, one_time_payment, confirmed, 20, , 2026-01-02T00:00:00Z,\n"
        );
        let reader = SponsorshipReader::new(data.as_bytes());
        let rows: Vec<Result<SponsorshipRow>> = reader.records().collect();
        assert_eq!(rows.len(), 2);

        let (first, gateway) = rows[0].as_ref().unwrap().clone().into_parts();
        assert_eq!(first.status, SponsorshipStatus::Paused);
        assert_eq!(first.amount, dec!(5.00));
        assert_eq!(first.external_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(gateway, Some(GatewayState::Missing));

        let (second, gateway) = rows[1].as_ref().unwrap().clone().into_parts();
        assert_eq!(second.r#type, SponsorshipType::OneTimePayment);
        assert_eq!(second.external_subscription_id, None);
        assert!(second.deleted_at.is_some());
        assert_eq!(gateway, None);
    }

    #[test]
    fn test_reader_without_gateway_column() {
        let data = "id,public_id,sponsor_id,sponsored_explorer_id,type,status,amount,external_subscription_id,deleted_at\n\
                    1,sp_1,10,1,subscription,active,5,sub_1,\n";
        let rows: Vec<Result<SponsorshipRow>> =
            SponsorshipReader::new(data.as_bytes()).records().collect();
        assert_eq!(rows[0].as_ref().unwrap().gateway, None);
    }

    #[test]
    fn test_reader_users() {
        let data = "id,username,email,resting_since\n\
                    1,ada,ada@example.com,2026-01-01T00:00:00Z\n\
                    2,sam,sam@example.com,\n";
        let users: Vec<User> = UserReader::new(data.as_bytes())
            .records()
            .collect::<Result<_>>()
            .unwrap();
        assert!(users[0].resting_since.is_some());
        assert_eq!(users[1].resting_since, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\n1,sp_1,10,1,subscription,frozen,5,sub_1,,\n");
        let rows: Vec<Result<SponsorshipRow>> =
            SponsorshipReader::new(data.as_bytes()).records().collect();
        assert!(rows[0].is_err());
    }
}
