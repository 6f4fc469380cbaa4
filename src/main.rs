use std::sync::Arc;

use chrono::{Duration, Utc};
use scylla::client::session_builder::SessionBuilder;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use travel_order_workflow::config::{NotificationBackend, StoreBackend, WorkflowConfig};
use travel_order_workflow::domain::approval_chain::{Approver, ApproverRoster, InMemoryRoster};
use travel_order_workflow::domain::hierarchy::{HierarchyTable, OrgUnitType};
use travel_order_workflow::domain::travel_order::{
    DecisionRequest, DraftRequest, ItineraryLine, MonthlySequenceAllocator, OrderAmendment, Submitter,
    TravelDetails, TravelOrderCommandHandler, TravelOrderEvent,
};
use travel_order_workflow::event_sourcing::store::{EventStore, InMemoryEventStore, ScyllaEventStore};
use travel_order_workflow::messaging::{LoggingNotificationSink, NotificationSink, RedpandaNotificationSink};
use travel_order_workflow::metrics::{self, WorkflowMetrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkflowConfig::load()?;

    // RUST_LOG overrides the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .init();

    tracing::info!("🚀 Starting travel order approval workflow");

    // === 1. Metrics ===
    let metrics = Arc::new(WorkflowMetrics::new()?);
    if config.metrics.enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new().block_on(metrics::start_metrics_server(registry, port));
            if let Err(e) = result {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Event store ===
    let event_store: Arc<dyn EventStore<TravelOrderEvent>> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
        StoreBackend::Scylla => {
            tracing::info!(nodes = ?config.store.known_nodes, "Connecting to ScyllaDB...");
            let session = SessionBuilder::new()
                .known_nodes(&config.store.known_nodes)
                .build()
                .await?;
            let store = ScyllaEventStore::new(Arc::new(session), "travel_order_events");
            store.ensure_schema(&config.store.keyspace).await?;
            Arc::new(store)
        }
    };

    // === 3. Notifications ===
    let notifications: Arc<dyn NotificationSink> = match config.notifications.backend {
        NotificationBackend::Log => Arc::new(LoggingNotificationSink),
        NotificationBackend::Redpanda => Arc::new(RedpandaNotificationSink::new(
            &config.notifications.brokers,
            config.notifications.topic.clone(),
        )?),
    };

    // === 4. Hierarchy and roster ===
    let hierarchy = match &config.workflow.hierarchy_path {
        Some(path) => HierarchyTable::from_path(path)?,
        None => HierarchyTable::builtin(),
    };
    let roster = demo_roster();
    tracing::info!(units = hierarchy.units().count(), approvers = roster.len(), "Loaded organization");

    let numbers = MonthlySequenceAllocator::new(config.workflow.order_number_prefix.clone(), event_store.clone());
    let handler = TravelOrderCommandHandler::new(event_store, Arc::new(hierarchy), Arc::new(roster.clone()))
        .with_numbering(Arc::new(numbers))
        .with_notifications(notifications)
        .with_metrics(metrics.clone())
        .with_policy(config.policy());

    // === 5. Demonstrate a full approval lifecycle ===
    run_demo(&handler, &roster).await?;

    tracing::info!("🎉 Demo complete!");
    Ok(())
}

/// Field office submitter, rejected once at TMSD, then approved on the second round
async fn run_demo(handler: &TravelOrderCommandHandler, roster: &InMemoryRoster) -> anyhow::Result<()> {
    let submitter = Submitter {
        employee_id: Uuid::now_v7(),
        name: "Ana Villanueva".to_string(),
        unit: OrgUnitType::new("pugo_csc"),
    };
    let departure = Utc::now().date_naive() + Duration::days(14);
    let details = TravelDetails {
        destination: "San Fernando City, La Union".to_string(),
        purpose: "Frequency assignment inspection".to_string(),
        departure_date: departure,
        return_date: departure + Duration::days(1),
        employees: vec![],
        itinerary: vec![ItineraryLine {
            date: departure,
            destination: "San Fernando City".to_string(),
            departure_time: None,
            arrival_time: None,
            means_of_transport: Some("Public utility bus".to_string()),
        }],
    };

    let order = handler.create_draft(DraftRequest::new(submitter, details)).await?;
    for bound in order.chain.levels() {
        tracing::info!(level = %bound.level, approver = %bound.approver.name, "Chain level");
    }

    let order = handler.submit(order.id).await?;
    tracing::info!("✅ Order {} submitted: {}", order.id, order.status);

    // Round 1: rejected at TMSD
    approve_current(handler, order.id).await?;
    approve_current(handler, order.id).await?;
    let current = handler.load(order.id).await?;
    let approver = current
        .current_approver()
        .map(|a| a.id)
        .ok_or_else(|| anyhow::anyhow!("order {} has no current approver", order.id))?;
    let order = handler
        .decide(order.id, DecisionRequest::reject(approver, "Attach the inspection memorandum"))
        .await?;
    tracing::info!("❌ Order {} rejected: {:?}", order.id, order.rejection_comment);

    // Round 2
    let amendment = OrderAmendment {
        purpose: Some("Frequency assignment inspection per attached memorandum".to_string()),
        ..Default::default()
    };
    let order = handler.resubmit(order.id, amendment).await?;
    tracing::info!("🔁 Order {} resubmitted, round {}", order.id, order.round);

    for _ in 0..order.chain.len() - 1 {
        approve_current(handler, order.id).await?;
    }

    // Final level signed by a delegate director instead of the bound one
    let current = handler.load(order.id).await?;
    let bound = current.current_approver().map(|a| a.id);
    let delegate = roster
        .directors()
        .into_iter()
        .find(|d| Some(d.id) != bound)
        .map(|d| d.id)
        .or(bound)
        .ok_or_else(|| anyhow::anyhow!("no director available"))?;
    let order = handler
        .decide(order.id, DecisionRequest::approve(delegate, "data:image/png;base64,iVBORw0KGgo="))
        .await?;

    tracing::info!(
        order_id = %order.id,
        status = %order.status,
        number = ?order.travel_order_number,
        decisions = order.decisions.len(),
        "✅ Order completed"
    );
    Ok(())
}

async fn approve_current(handler: &TravelOrderCommandHandler, order_id: Uuid) -> anyhow::Result<()> {
    let order = handler.load(order_id).await?;
    let (level, approver) = match (order.current_level(), order.current_approver()) {
        (Some(level), Some(approver)) => (level, approver.clone()),
        _ => anyhow::bail!("order {} is not awaiting approval ({})", order_id, order.status),
    };

    let request = DecisionRequest::approve(approver.id, "data:image/png;base64,iVBORw0KGgo=").at_level(level);
    let order = handler.decide(order_id, request).await?;
    tracing::info!("✍️  {} signed level {}; order now {}", approver.name, level, order.status);
    Ok(())
}

fn demo_roster() -> InMemoryRoster {
    let head = |name: &str, unit: &str| Approver::head(Uuid::now_v7(), name, OrgUnitType::new(unit));

    InMemoryRoster::default()
        .with(head("Pugo CSC Chief", "pugo_csc"))
        .with(head("La Union PO Head", "launion_po"))
        .with(head("TMSD Chief", "tmsd"))
        .with(head("AFSD Chief", "afsd"))
        .with(Approver::director(Uuid::now_v7(), "Regional Director", OrgUnitType::regional()))
        .with(Approver::director(Uuid::now_v7(), "Assistant Regional Director", OrgUnitType::regional()))
}
