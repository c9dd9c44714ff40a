//! Sample Customer Generator
//!
//! Writes random customer rows as CSV for smoke testing `churn-predict`.

use churn_inference::types::customer::{CustomerRecord, Gender, Geography};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate random customer rows as CSV", long_about = None)]
struct Args {
    /// Number of customers to generate
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,

    /// Share of customers drawn from the at-risk profile
    #[arg(long, default_value_t = 0.2)]
    at_risk_rate: f64,

    /// Output CSV file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

struct CustomerGenerator {
    rng: StdRng,
}

impl CustomerGenerator {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Long tenure, several products, active online, no outstanding balance
    fn generate_stable(&mut self) -> CustomerRecord {
        let annual_income = self.rng.gen_range(40_000.0..180_000.0);
        let balance = if self.rng.gen_bool(0.6) {
            0.0
        } else {
            self.rng.gen_range(10_000.0..120_000.0)
        };
        let mut customer = CustomerRecord::new(
            self.rng.gen_range(620.0..850.0_f64).round(),
            self.random_geography(),
            self.random_gender(),
            self.rng.gen_range(25..60),
            self.rng.gen_range(3.0..30.0_f64).round(),
            round2(balance),
            self.rng.gen_range(2..=3),
            u8::from(self.rng.gen_bool(0.7)),
            1,
            round2(annual_income),
        );
        self.fill_ratios(&mut customer, 0.0..0.3);
        customer
    }

    /// Older customers with a single product, high balance and no online banking
    fn generate_at_risk(&mut self) -> CustomerRecord {
        let annual_income = self.rng.gen_range(20_000.0..90_000.0);
        let balance = self.rng.gen_range(80_000.0..250_000.0);
        let mut customer = CustomerRecord::new(
            self.rng.gen_range(350.0..650.0_f64).round(),
            self.random_geography(),
            self.random_gender(),
            self.rng.gen_range(45..80),
            self.rng.gen_range(0.0..5.0_f64).round(),
            round2(balance),
            self.rng.gen_range(1..=4),
            u8::from(self.rng.gen_bool(0.5)),
            0,
            round2(annual_income),
        );
        self.fill_ratios(&mut customer, 0.4..1.0);
        customer
    }

    fn fill_ratios(&mut self, customer: &mut CustomerRecord, risk: std::ops::Range<f64>) {
        let annual = customer.annual_income;
        let property = annual * self.rng.gen_range(2.5..5.0);
        let balance = customer.outstanding_loan_balance;

        customer.monthly_income = Some(round2(annual / 12.0));
        customer.estimated_property_value = Some(round2(property));
        customer.ltv_ratio = Some(round3((balance / property).min(2.0)));
        customer.payment_to_income_ratio = Some(round3((balance * 0.06 / annual).min(2.0)));
        customer.risk_score = Some(round3(self.rng.gen_range(risk)));
        customer.balance_per_product =
            Some(round2(balance / customer.num_bank_products as f64));
    }

    /// Roughly half of customers are in France, a quarter each in Germany and Spain.
    fn random_geography(&mut self) -> Geography {
        match self.rng.gen_range(0..4) {
            0 | 1 => Geography::France,
            2 => Geography::Germany,
            _ => Geography::Spain,
        }
    }

    fn random_gender(&mut self) -> Gender {
        if self.rng.gen_bool(0.55) {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_customers=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.at_risk_rate) {
        anyhow::bail!("--at-risk-rate must be within [0, 1]");
    }

    info!(
        count = args.count,
        at_risk_rate = args.at_risk_rate,
        seed = ?args.seed,
        "Generating sample customers"
    );

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut generator = CustomerGenerator::new(args.seed);
    let mut at_risk = 0;
    for _ in 0..args.count {
        let customer = if generator.rng.gen_bool(args.at_risk_rate) {
            at_risk += 1;
            generator.generate_at_risk()
        } else {
            generator.generate_stable()
        };
        writer.serialize(&customer)?;
    }
    writer.flush()?;

    info!(
        "Completed! Generated {} customers ({} stable, {} at risk)",
        args.count,
        args.count - at_risk,
        at_risk
    );
    Ok(())
}
