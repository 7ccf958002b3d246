//! risk-check: headless credit-risk check against a customer database.
//!
//! Usage:
//!   risk-check --db customers.db --order order.json
//!   risk-check --db customers.db --customers sync.json --ipc-mode

use anyhow::Result;
use posrisk_core::{
    guard::RiskAssessment,
    store::{CustomerStore, SqliteCustomerStore},
    types::CustomerId,
    CustomerRecord, GuardConfig, Order, RiskGuard,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

/// Exit status of a one-shot evaluation that blocked the sale.
const EXIT_BLOCKED: u8 = 2;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Evaluate { order: Order },
    Lookup { customer_id: CustomerId },
    Quit,
}

#[derive(serde::Serialize)]
struct EvaluationReport {
    evaluated_at: String,
    #[serde(flatten)]
    assessment: RiskAssessment,
}

impl EvaluationReport {
    fn new(assessment: RiskAssessment) -> Self {
        Self {
            evaluated_at: chrono::Utc::now().to_rfc3339(),
            assessment,
        }
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let config_path = arg_value(&args, "--config").unwrap_or("./data/risk_guard.json");
    let customers_path = arg_value(&args, "--customers");
    let order_path = arg_value(&args, "--order");

    let config = if Path::new(config_path).exists() {
        GuardConfig::load(config_path)?
    } else {
        log::info!("no config at {config_path}, using defaults");
        GuardConfig::default()
    };

    let store = SqliteCustomerStore::open(db)?;
    store.migrate()?;
    if let Some(path) = customers_path {
        let synced = sync_customers(&store, path)?;
        log::info!("synced {synced} customer records from {path}");
    }

    let guard = RiskGuard::new(store, config);

    if ipc_mode {
        run_ipc_loop(&guard)?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(order_path) = order_path else {
        anyhow::bail!("either --order PATH or --ipc-mode is required");
    };
    let content = std::fs::read_to_string(order_path)
        .map_err(|e| anyhow::anyhow!("Cannot read {order_path}: {e}"))?;
    let order: Order = serde_json::from_str(&content)?;
    let report = EvaluationReport::new(guard.assess(&order));
    let allowed = report.assessment.decision.is_allowed();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_BLOCKED)
    })
}

/// Upsert a JSON array of host-loaded customer records.
fn sync_customers(store: &SqliteCustomerStore, path: &str) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    for raw in &records {
        let record = CustomerRecord::from_loaded(raw)?;
        store.upsert_customer(&record)?;
    }
    Ok(records.len())
}

fn run_ipc_loop(guard: &RiskGuard<SqliteCustomerStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Evaluate { order } => {
                let report = EvaluationReport::new(guard.assess(&order));
                writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
            }
            IpcCommand::Lookup { customer_id } => {
                let response = match guard.store().lookup(customer_id) {
                    Ok(record) => serde_json::json!({ "customer": record }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                writeln!(stdout, "{}", response)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
