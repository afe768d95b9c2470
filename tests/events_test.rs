mod common;

use anyhow::Result;
use common::{Trip, test_service};
use divvy::application::{AppError, NewExpense};
use divvy::domain::{Event, Expense, MAX_AMOUNT_CENTS, parse_cents};
use divvy::io::Exporter;
use divvy::storage::Repository;
use tempfile::TempDir;

#[tokio::test]
async fn test_create_and_list_events() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let ski = service.create_event("Ski trip", "EUR").await?;
    let blank = service.create_event("", "").await?;

    assert_eq!(blank.name, "New Event");
    assert_eq!(blank.currency, "UAH");

    let events = service.list_events().await?;
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e.id == ski.id));

    let fetched = service.get_event(&ski.id).await?;
    assert_eq!(fetched.name, "Ski trip");

    Ok(())
}

#[tokio::test]
async fn test_unknown_event_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.settle("deadbeef").await;
    assert!(matches!(result, Err(AppError::EventNotFound(_))));

    let result = service.add_participant("deadbeef", "A").await;
    assert!(matches!(result, Err(AppError::EventNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_participant_name_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let event = service.create_event("Dinner", "EUR").await?;

    let result = service.add_participant(&event.id, "   ").await;
    assert!(matches!(result, Err(AppError::NameRequired)));

    let anna = service.add_participant(&event.id, "  Anna ").await?;
    assert_eq!(anna.name, "Anna");

    let result = service.add_participant(&event.id, "Anna").await;
    assert!(matches!(result, Err(AppError::ParticipantAlreadyExists(_))));

    // Same name is fine in another event
    let other = service.create_event("Lunch", "EUR").await?;
    service.add_participant(&other.id, "Anna").await?;

    Ok(())
}

#[tokio::test]
async fn test_payer_cannot_be_removed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B", "C"]).await?;
    trip.pay(&service, 900, 0, &[0, 1, 2]).await?;

    let result = service.remove_participant(&trip.event.id, trip.ids[0]).await;
    assert!(matches!(result, Err(AppError::ParticipantHasPaid(_))));

    // Nothing was removed along with the rejected payer
    let detail = service.event_detail(&trip.event.id).await?;
    assert_eq!(detail.participant_ids(), trip.ids);
    assert_eq!(detail.expenses.len(), 1);
    assert_eq!(detail.expenses[0].beneficiaries, trip.ids);

    Ok(())
}

#[tokio::test]
async fn test_repository_keeps_payer_and_expense() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;

    let event = Event::new("Trip", "EUR");
    repo.save_event(&event).await?;
    let payer = repo.add_participant(&event.id, "A").await?;
    let other = repo.add_participant(&event.id, "B").await?;
    let mut expense = Expense::new(event.id.clone(), 500, payer.id, vec![payer.id, other.id]);
    repo.save_expense(&mut expense).await?;

    assert!(!repo.delete_participant(payer.id).await?);
    assert!(repo.get_participant(&event.id, payer.id).await?.is_some());
    assert!(repo.get_expense(&event.id, expense.id).await?.is_some());

    assert!(repo.delete_participant(other.id).await?);
    let remaining = repo.list_expenses(&event.id).await?;
    assert_eq!(remaining[0].beneficiaries, vec![payer.id]);

    // Already gone
    assert!(!repo.delete_participant(other.id).await?);

    Ok(())
}

#[tokio::test]
async fn test_removed_beneficiary_drops_out_of_split() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B", "C"]).await?;
    trip.pay(&service, 900, 0, &[0, 1, 2]).await?;

    let removed = service.remove_participant(&trip.event.id, trip.ids[2]).await?;
    assert_eq!(removed.name, "C");

    let expenses = service.list_expenses(&trip.event.id).await?;
    assert_eq!(expenses[0].beneficiaries, vec![trip.ids[0], trip.ids[1]]);

    let report = service.settle(&trip.event.id).await?;
    let cents: Vec<i64> = report.balances.iter().map(|b| b.balance_cents).collect();
    assert_eq!(cents, vec![450, -450]);

    Ok(())
}

#[tokio::test]
async fn test_remove_participant_from_wrong_event() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A"]).await?;
    let other = service.create_event("Other", "EUR").await?;

    let result = service.remove_participant(&other.id, trip.ids[0]).await;
    assert!(matches!(result, Err(AppError::ParticipantNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_expense_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B"]).await?;
    let outsider = Trip::create(&service, &["Z"]).await?;

    let result = trip.pay(&service, 0, 0, &[0, 1]).await;
    assert!(matches!(
        result.unwrap_err().downcast_ref::<AppError>(),
        Some(AppError::InvalidAmount(_))
    ));

    let result = service
        .add_expense(
            &trip.event.id,
            NewExpense {
                title: None,
                amount_cents: 100,
                paid_by: outsider.ids[0],
                beneficiaries: vec![],
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::PayerNotFound(_))));

    let result = service
        .add_expense(
            &trip.event.id,
            NewExpense {
                title: None,
                amount_cents: 100,
                paid_by: trip.ids[0],
                beneficiaries: vec![trip.ids[1], outsider.ids[0]],
            },
        )
        .await;
    match result {
        Err(AppError::InvalidParticipants(ids)) => assert_eq!(ids, vec![outsider.ids[0]]),
        other => panic!("expected InvalidParticipants, got {:?}", other.map(|e| e.id)),
    }

    assert!(service.list_expenses(&trip.event.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_expense_amount_is_capped() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B"]).await?;

    let result = trip.pay(&service, MAX_AMOUNT_CENTS + 1, 0, &[1]).await;
    assert!(matches!(
        result.unwrap_err().downcast_ref::<AppError>(),
        Some(AppError::InvalidAmount(_))
    ));

    // Parses fine, but far beyond what an expense may carry
    let huge = parse_cents("50000000000000000")?;
    let result = trip.pay(&service, huge, 0, &[1]).await;
    assert!(matches!(
        result.unwrap_err().downcast_ref::<AppError>(),
        Some(AppError::InvalidAmount(_))
    ));
    assert!(service.list_expenses(&trip.event.id).await?.is_empty());

    trip.pay(&service, MAX_AMOUNT_CENTS, 0, &[1]).await?;
    trip.pay(&service, MAX_AMOUNT_CENTS, 0, &[1]).await?;

    let report = service.settle(&trip.event.id).await?;
    assert_eq!(report.balances[0].balance_cents, 2 * MAX_AMOUNT_CENTS);
    assert_eq!(report.transfers.len(), 1);
    assert_eq!(report.transfers[0].amount, "42949672.94");

    Ok(())
}

#[tokio::test]
async fn test_expense_defaults() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B", "C"]).await?;

    let expense = service
        .add_expense(
            &trip.event.id,
            NewExpense {
                title: Some("  ".into()),
                amount_cents: 300,
                paid_by: trip.ids[1],
                beneficiaries: vec![],
            },
        )
        .await?;
    assert_eq!(expense.title, "Expense");
    assert_eq!(expense.beneficiaries, trip.ids);

    let expense = service
        .add_expense(
            &trip.event.id,
            NewExpense {
                title: Some("Taxi".into()),
                amount_cents: 300,
                paid_by: trip.ids[1],
                beneficiaries: vec![trip.ids[2], trip.ids[0], trip.ids[2]],
            },
        )
        .await?;
    assert_eq!(expense.title, "Taxi");
    assert_eq!(expense.beneficiaries, vec![trip.ids[2], trip.ids[0]]);

    Ok(())
}

#[tokio::test]
async fn test_expense_info_and_removal() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B", "C"]).await?;
    let expense = trip.pay(&service, 1000, 0, &[1, 2, 0]).await?;

    let info = service.get_expense_info(&trip.event.id, expense.id).await?;
    assert_eq!(info.payer_name, "A");
    assert_eq!(
        info.shares,
        vec![
            ("B".to_string(), 334),
            ("C".to_string(), 333),
            ("A".to_string(), 333)
        ]
    );

    service.remove_expense(&trip.event.id, expense.id).await?;
    let result = service.remove_expense(&trip.event.id, expense.id).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    let report = service.settle(&trip.event.id).await?;
    assert!(report.is_settled());

    Ok(())
}

#[tokio::test]
async fn test_event_detail_and_delete() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B"]).await?;
    trip.pay(&service, 250, 0, &[0, 1]).await?;
    trip.pay(&service, 120, 1, &[0]).await?;

    let detail = service.event_detail(&trip.event.id).await?;
    assert_eq!(detail.participants.len(), 2);
    assert_eq!(detail.expenses.len(), 2);
    assert_eq!(detail.expenses[1].beneficiaries, vec![trip.ids[0]]);

    service.delete_event(&trip.event.id).await?;
    let result = service.event_detail(&trip.event.id).await;
    assert!(matches!(result, Err(AppError::EventNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_export_csv_and_json() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service, &["A", "B", "C"]).await?;
    trip.pay(&service, 1000, 0, &[0, 1, 2]).await?;

    let exporter = Exporter::new(&service);

    let mut balances = Vec::new();
    let count = exporter
        .export_balances_csv(&trip.event.id, &mut balances)
        .await?;
    assert_eq!(count, 3);
    let balances = String::from_utf8(balances)?;
    let lines: Vec<&str> = balances.lines().collect();
    assert_eq!(lines[0], "participant_id,name,balance_cents,balance");
    assert_eq!(lines[1], format!("{},A,666,6.66", trip.ids[0]));

    let mut transfers = Vec::new();
    let count = exporter
        .export_transfers_csv(&trip.event.id, &mut transfers)
        .await?;
    assert_eq!(count, 2);
    let transfers = String::from_utf8(transfers)?;
    assert_eq!(
        transfers.lines().collect::<Vec<_>>(),
        vec!["from,to,amount_cents,amount", "B,A,333,3.33", "C,A,333,3.33"]
    );

    let mut json = Vec::new();
    let export = exporter.export_event_json(&trip.event.id, &mut json).await?;
    assert_eq!(export.snapshot.expenses.len(), 1);
    let value: serde_json::Value = serde_json::from_slice(&json)?;
    assert_eq!(value["event"]["id"], trip.event.id.as_str());
    assert_eq!(value["participants"].as_array().map(Vec::len), Some(3));
    assert_eq!(value["settlement"]["transfers"][0]["amount"], "3.33");

    Ok(())
}
