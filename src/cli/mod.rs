use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{EventService, NewExpense, SettlementReport};
use crate::domain::{DEFAULT_CURRENCY, ExpenseId, ParticipantId, format_cents, parse_cents};

/// Divvy - Group Expense Splitter
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "A local-first tool that splits shared expenses and settles debts")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "DIVVY_DATABASE", default_value = "divvy.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Event management commands
    #[command(subcommand)]
    Event(EventCommands),

    /// Participant management commands
    #[command(subcommand)]
    Participant(ParticipantCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Show balances and the transfers that settle an event
    Settle {
        /// Event ID
        event: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export balances, transfers or a full event
    Export {
        /// What to export: balances, transfers, event
        export_type: String,

        /// Event ID
        event: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// Create a new event
    Create {
        /// Event name (defaults to "New Event")
        name: Option<String>,

        /// Currency code (e.g., UAH, EUR)
        #[arg(short, long, default_value = DEFAULT_CURRENCY)]
        currency: String,
    },

    /// List all events
    List,

    /// Show an event with its participants and expenses
    Show {
        /// Event ID
        event: String,
    },

    /// Delete an event and everything recorded in it
    Delete {
        /// Event ID
        event: String,
    },
}

#[derive(Subcommand)]
pub enum ParticipantCommands {
    /// Add a participant to an event
    Add {
        /// Event ID
        event: String,

        /// Participant name (unique within the event)
        name: String,
    },

    /// List participants of an event
    List {
        /// Event ID
        event: String,
    },

    /// Remove a participant who has not paid any expense
    Remove {
        /// Event ID
        event: String,

        /// Participant ID
        id: ParticipantId,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Event ID
        event: String,

        /// Amount paid (e.g., "50.00" or "50")
        amount: String,

        /// ID of the participant who paid
        #[arg(long)]
        paid_by: ParticipantId,

        /// Comma-separated participant IDs sharing the cost (defaults to everyone)
        #[arg(long = "for", value_delimiter = ',')]
        beneficiaries: Vec<ParticipantId>,

        /// Expense title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List expenses of an event
    List {
        /// Event ID
        event: String,
    },

    /// Show an expense with each participant's share
    Show {
        /// Event ID
        event: String,

        /// Expense ID
        id: ExpenseId,
    },

    /// Remove an expense
    Remove {
        /// Event ID
        event: String,

        /// Expense ID
        id: ExpenseId,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                EventService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Event(event_cmd) => {
                let service = EventService::connect(&self.database).await?;
                run_event_command(&service, event_cmd).await?;
            }

            Commands::Participant(participant_cmd) => {
                let service = EventService::connect(&self.database).await?;
                run_participant_command(&service, participant_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = EventService::connect(&self.database).await?;
                run_expense_command(&service, expense_cmd).await?;
            }

            Commands::Settle { event, format } => {
                let service = EventService::connect(&self.database).await?;
                run_settle_command(&service, &event, &format).await?;
            }

            Commands::Export {
                export_type,
                event,
                output,
            } => {
                let service = EventService::connect(&self.database).await?;
                run_export_command(&service, &export_type, &event, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_event_command(service: &EventService, cmd: EventCommands) -> Result<()> {
    match cmd {
        EventCommands::Create { name, currency } => {
            let event = service
                .create_event(name.as_deref().unwrap_or_default(), &currency)
                .await?;
            println!(
                "Created event: {} ({}, {})",
                event.name, event.id, event.currency
            );
        }

        EventCommands::List => {
            let events = service.list_events().await?;
            if events.is_empty() {
                println!("No events found.");
            } else {
                println!("{:<10} {:<24} {:<8} CREATED", "ID", "NAME", "CURRENCY");
                println!("{}", "-".repeat(60));
                for event in events {
                    println!(
                        "{:<10} {:<24} {:<8} {}",
                        event.id,
                        truncate(&event.name, 24),
                        event.currency,
                        event.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        EventCommands::Show { event } => {
            let detail = service.event_detail(&event).await?;
            let names = detail.participant_names();
            let name_of = |id: ParticipantId| names.get(&id).map(|s| s.as_str()).unwrap_or("?");

            println!("Event: {}", detail.event.name);
            println!("  ID:       {}", detail.event.id);
            println!("  Currency: {}", detail.event.currency);
            println!(
                "  Created:  {}",
                detail.event.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();

            println!("Participants ({}):", detail.participants.len());
            for participant in &detail.participants {
                println!("  {:>4}  {}", participant.id, participant.name);
            }
            println!();

            println!("Expenses ({}):", detail.expenses.len());
            for expense in &detail.expenses {
                let shared_by: Vec<&str> =
                    expense.beneficiaries.iter().map(|id| name_of(*id)).collect();
                println!(
                    "  {:>4}  {:>10}  {:<20} paid by {:<12} for {}",
                    expense.id,
                    format_cents(expense.amount_cents),
                    truncate(&expense.title, 20),
                    name_of(expense.paid_by),
                    shared_by.join(", ")
                );
            }
        }

        EventCommands::Delete { event } => {
            let deleted = service.delete_event(&event).await?;
            println!("Deleted event: {} ({})", deleted.name, deleted.id);
        }
    }
    Ok(())
}

async fn run_participant_command(service: &EventService, cmd: ParticipantCommands) -> Result<()> {
    match cmd {
        ParticipantCommands::Add { event, name } => {
            let participant = service.add_participant(&event, &name).await?;
            println!(
                "Added participant: {} (id {})",
                participant.name, participant.id
            );
        }

        ParticipantCommands::List { event } => {
            let participants = service.list_participants(&event).await?;
            if participants.is_empty() {
                println!("No participants found.");
            } else {
                println!("{:>6}  NAME", "ID");
                println!("{}", "-".repeat(30));
                for participant in participants {
                    println!("{:>6}  {}", participant.id, participant.name);
                }
            }
        }

        ParticipantCommands::Remove { event, id } => {
            let participant = service.remove_participant(&event, id).await?;
            println!("Removed participant: {}", participant.name);
        }
    }
    Ok(())
}

async fn run_expense_command(service: &EventService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            event,
            amount,
            paid_by,
            beneficiaries,
            title,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

            let expense = service
                .add_expense(
                    &event,
                    NewExpense {
                        title,
                        amount_cents,
                        paid_by,
                        beneficiaries,
                    },
                )
                .await?;

            println!(
                "Recorded expense: {} {} split {} ways (id {})",
                expense.title,
                format_cents(expense.amount_cents),
                expense.beneficiaries.len(),
                expense.id
            );
        }

        ExpenseCommands::List { event } => {
            let expenses = service.list_expenses(&event).await?;
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:>6} {:<12} {:>10} {:<20} {:>8}",
                    "ID", "DATE", "AMOUNT", "TITLE", "SHARED"
                );
                println!("{}", "-".repeat(60));
                for expense in expenses {
                    println!(
                        "{:>6} {:<12} {:>10} {:<20} {:>8}",
                        expense.id,
                        expense.created_at.format("%Y-%m-%d"),
                        format_cents(expense.amount_cents),
                        truncate(&expense.title, 20),
                        expense.beneficiaries.len()
                    );
                }
            }
        }

        ExpenseCommands::Show { event, id } => {
            let info = service.get_expense_info(&event, id).await?;
            let expense = &info.expense;

            println!("Expense: {}", expense.id);
            println!("  Title:   {}", expense.title);
            println!("  Amount:  {}", format_cents(expense.amount_cents));
            println!("  Paid by: {}", info.payer_name);
            println!(
                "  Date:    {}",
                expense.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Shares:");
            for (name, owed) in &info.shares {
                println!("    {:<20} {:>10}", name, format_cents(*owed));
            }
        }

        ExpenseCommands::Remove { event, id } => {
            let expense = service.remove_expense(&event, id).await?;
            println!(
                "Removed expense: {} {}",
                expense.title,
                format_cents(expense.amount_cents)
            );
        }
    }
    Ok(())
}

async fn run_settle_command(service: &EventService, event: &str, format: &str) -> Result<()> {
    let report = service.settle(event).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "table" => print_settlement_table(&report),
        _ => anyhow::bail!("Invalid format '{}'. Valid formats: table, json", format),
    }

    Ok(())
}

fn print_settlement_table(report: &SettlementReport) {
    if report.balances.is_empty() {
        println!("No participants found.");
        return;
    }

    println!("{:<20} {:>12} {:<8}", "PARTICIPANT", "BALANCE", "CURRENCY");
    println!("{}", "-".repeat(42));
    for line in &report.balances {
        println!(
            "{:<20} {:>12} {:<8}",
            truncate(&line.name, 20),
            line.balance,
            report.currency
        );
    }
    println!();

    if report.is_settled() {
        println!("All settled up.");
        return;
    }

    println!("Transfers:");
    for transfer in &report.transfers {
        println!(
            "  {} -> {}: {} {}",
            transfer.from, transfer.to, transfer.amount, report.currency
        );
    }
}

async fn run_export_command(
    service: &EventService,
    export_type: &str,
    event: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "balances" => {
            let count = exporter.export_balances_csv(event, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "transfers" => {
            let count = exporter.export_transfers_csv(event, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transfers", count);
            }
        }
        "event" => {
            let export = exporter.export_event_json(event, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported event {}: {} participants, {} expenses, {} transfers",
                    export.snapshot.event.id,
                    export.snapshot.participants.len(),
                    export.snapshot.expenses.len(),
                    export.settlement.transfers.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: balances, transfers, event",
                export_type
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
        assert_eq!(truncate("Вечеря в ресторані", 8), "Вечер...");
    }

    #[test]
    fn test_parse_expense_beneficiaries() {
        let cli = Cli::try_parse_from([
            "divvy", "expense", "add", "abcd1234", "12.50", "--paid-by", "1", "--for", "1,2,3",
        ])
        .unwrap();

        match cli.command {
            Commands::Expense(ExpenseCommands::Add {
                amount,
                paid_by,
                beneficiaries,
                ..
            }) => {
                assert_eq!(amount, "12.50");
                assert_eq!(paid_by, 1);
                assert_eq!(beneficiaries, vec![1, 2, 3]);
            }
            _ => panic!("expected expense add"),
        }
    }

    #[test]
    fn test_parse_expense_defaults_to_everyone() {
        let cli =
            Cli::try_parse_from(["divvy", "expense", "add", "abcd1234", "10", "--paid-by", "2"])
                .unwrap();

        match cli.command {
            Commands::Expense(ExpenseCommands::Add { beneficiaries, .. }) => {
                assert!(beneficiaries.is_empty());
            }
            _ => panic!("expected expense add"),
        }
    }
}
