use crate::domain::sponsorship::{
    Sponsorship, SponsorshipId, SponsorshipStatus, SponsorshipType, UserId,
};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct SponsorshipStatusRow<'a> {
    id: SponsorshipId,
    public_id: &'a str,
    sponsor_id: UserId,
    sponsored_explorer_id: UserId,
    r#type: SponsorshipType,
    status: SponsorshipStatus,
    external_subscription_id: &'a str,
}

/// Writes the billing status of each sponsorship as CSV.
pub struct SponsorshipWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SponsorshipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_sponsorships(&mut self, sponsorships: &[Sponsorship]) -> Result<()> {
        for sponsorship in sponsorships {
            self.writer.serialize(SponsorshipStatusRow {
                id: sponsorship.id,
                public_id: &sponsorship.public_id,
                sponsor_id: sponsorship.sponsor_id,
                sponsored_explorer_id: sponsorship.sponsored_explorer_id,
                r#type: sponsorship.r#type,
                status: sponsorship.status,
                external_subscription_id: sponsorship
                    .external_subscription_id
                    .as_deref()
                    .unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writer_output() {
        let sponsorships = vec![
            Sponsorship {
                id: 1,
                public_id: "sp_1".to_string(),
                sponsor_id: 10,
                sponsored_explorer_id: 1,
                r#type: SponsorshipType::Subscription,
                status: SponsorshipStatus::Canceled,
                amount: dec!(5),
                external_subscription_id: Some("sub_1".to_string()),
                deleted_at: None,
            },
            Sponsorship {
                id: 2,
                public_id: "sp_2".to_string(),
                sponsor_id: 11,
                sponsored_explorer_id: 1,
                r#type: SponsorshipType::OneTimePayment,
                status: SponsorshipStatus::Confirmed,
                amount: dec!(20),
                external_subscription_id: None,
                deleted_at: None,
            },
        ];

        let mut buffer = Vec::new();
        SponsorshipWriter::new(&mut buffer)
            .write_sponsorships(&sponsorships)
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("id,public_id,sponsor_id,sponsored_explorer_id,type,status,external_subscription_id")
        );
        assert_eq!(lines.next(), Some("1,sp_1,10,1,subscription,canceled,sub_1"));
        assert_eq!(lines.next(), Some("2,sp_2,11,1,one_time_payment,confirmed,"));
    }
}
