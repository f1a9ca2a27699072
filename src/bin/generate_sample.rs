use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use parquet::arrow::ArrowWriter;

const REGIONS: [(&str, f64); 4] = [("North", 1.2), ("South", 0.9), ("East", 1.0), ("West", 0.7)];
const PRODUCTS: [(&str, f64, f64); 3] = [
    // name, base price, typical margin
    ("Widget", 120.0, 0.25),
    ("Gadget", 340.0, 0.18),
    ("Gizmo", 75.0, 0.32),
];
const DAYS: u64 = 60;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

struct Row {
    region: Option<&'static str>,
    product: &'static str,
    sales: Option<f64>,
    profit: Option<f64>,
    date: String,
}

fn generate(rng: &mut SimpleRng) -> Result<Vec<Row>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid start date")?;
    let mut rows = Vec::new();

    for day in 0..DAYS {
        let date = start
            .checked_add_days(Days::new(day))
            .context("date out of range")?
            .format("%Y-%m-%d")
            .to_string();

        for _ in 0..3 {
            let &(region, region_factor) = rng.pick(&REGIONS);
            let &(product, price, margin) = rng.pick(&PRODUCTS);
            let units = rng.gauss(10.0, 3.0).max(1.0).round();
            let sales = (units * price * region_factor * 100.0).round() / 100.0;
            let profit = (sales * rng.gauss(margin, 0.06) * 100.0).round() / 100.0;

            // A sprinkle of gaps so cleaning has something to do.
            rows.push(Row {
                region: (!rng.chance(0.02)).then_some(region),
                product,
                sales: (!rng.chance(0.04)).then_some(sales),
                profit: (!rng.chance(0.04)).then_some(profit),
                date: date.clone(),
            });
        }
    }
    Ok(rows)
}

fn write_csv(rows: &[Row], path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record(["Region", "Product", "Sales", "Profit", "Date"])?;
    for row in rows {
        let sales = row.sales.map(|v| v.to_string()).unwrap_or_default();
        let profit = row.profit.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([
            row.region.unwrap_or(""),
            row.product,
            sales.as_str(),
            profit.as_str(),
            row.date.as_str(),
        ])?;
    }
    writer.flush().with_context(|| format!("writing {path}"))?;
    Ok(())
}

fn write_parquet(rows: &[Row], path: &str) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Region", DataType::Utf8, true),
        Field::new("Product", DataType::Utf8, false),
        Field::new("Sales", DataType::Float64, true),
        Field::new("Profit", DataType::Float64, true),
        Field::new("Date", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(rows.iter().map(|r| r.region).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| Some(r.product)).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.sales).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.profit).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| Some(r.date.as_str())).collect::<StringArray>()),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng)?;

    write_csv(&rows, "sample_sales.csv")?;
    write_parquet(&rows, "sample_sales.parquet")?;

    println!(
        "Wrote {} sales rows over {DAYS} days to sample_sales.csv and sample_sales.parquet",
        rows.len()
    );
    Ok(())
}
