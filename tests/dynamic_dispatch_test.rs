use rust_decimal_macros::dec;
use sponsorship_lifecycle::domain::gateway::{CollectionBehavior, GatewayState};
use sponsorship_lifecycle::domain::notification::{AutoCancelNotice, NotificationEvent};
use sponsorship_lifecycle::domain::ports::{NotifierRef, PaymentGatewayRef, SponsorshipStoreRef};
use sponsorship_lifecycle::domain::sponsorship::{
    Sponsorship, SponsorshipFilter, SponsorshipStatus, SponsorshipType,
};
use sponsorship_lifecycle::domain::user::User;
use sponsorship_lifecycle::infrastructure::in_memory::InMemorySponsorshipStore;
use sponsorship_lifecycle::infrastructure::notifier::RecordingNotifier;
use sponsorship_lifecycle::infrastructure::simulated_gateway::SimulatedGateway;
use std::sync::Arc;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: SponsorshipStoreRef = Arc::new(InMemorySponsorshipStore::new());
    let simulated = SimulatedGateway::new();
    simulated.set_state("sub_1", GatewayState::Active).await;
    let gateway: PaymentGatewayRef = Arc::new(simulated.clone());
    let recorder = RecordingNotifier::new();
    let notifier: NotifierRef = Arc::new(recorder.clone());

    let sponsorship = Sponsorship {
        id: 1,
        public_id: "sp_1".to_string(),
        sponsor_id: 10,
        sponsored_explorer_id: 1,
        r#type: SponsorshipType::Subscription,
        status: SponsorshipStatus::Active,
        amount: dec!(12.50),
        external_subscription_id: Some("sub_1".to_string()),
        deleted_at: None,
    };
    let explorer = User {
        id: 1,
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        resting_since: None,
    };

    // Verify Send + Sync by spawning tasks
    let store_handle = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            store.store_user(explorer).await.unwrap();
            store.store_sponsorship(sponsorship).await.unwrap();
            store
                .find_sponsorships(&SponsorshipFilter::billable(1, SponsorshipStatus::Active))
                .await
                .unwrap()
        }
    });
    let gateway_handle = tokio::spawn(async move {
        gateway
            .pause("sub_1", CollectionBehavior::Void)
            .await
            .unwrap();
    });
    let notifier_handle = tokio::spawn(async move {
        notifier
            .emit(NotificationEvent::SponsorshipAutoCanceled(AutoCancelNotice {
                sponsorship_id: 1,
                sponsorship_public_id: "sp_1".to_string(),
                sponsor_id: 10,
                sponsor_email: "sponsor@example.com".to_string(),
                sponsor_name: "sponsor".to_string(),
                explorer_id: 1,
                explorer_name: "ada".to_string(),
                amount: dec!(12.50),
            }))
            .await
            .unwrap();
    });

    let found = store_handle.await.unwrap();
    assert_eq!(found.len(), 1);
    gateway_handle.await.unwrap();
    assert_eq!(simulated.state("sub_1").await, GatewayState::Paused);
    notifier_handle.await.unwrap();
    assert_eq!(recorder.events().await.len(), 1);
}
