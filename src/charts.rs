use std::fs;
use plotters::prelude::*;
use auction_outcome::logger::Logger;
use auction_outcome::utils::get_seed;
use crate::scenarios::{ab_bucket_rate, seeded_engine};
use crate::simulation::{run_simulation, PartnerParam, TrafficGenerator, TrafficParam};

const REQUESTS_PER_POINT: usize = 5000;
const PERCENT_STEPS: [i64; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
const THROTTLE_PARTNERS: [(&str, &str); 11] = [
    ("partner0", "0"), ("partner10", "10"), ("partner20", "20"), ("partner30", "30"),
    ("partner40", "40"), ("partner50", "50"), ("partner60", "60"), ("partner70", "70"),
    ("partner80", "80"), ("partner90", "90"), ("partner100", "100"),
];

/// Main function to generate all charts
pub fn generate_all_charts() -> Result<(), Box<dyn std::error::Error>> {
    // Create charts directory if it doesn't exist
    fs::create_dir_all("charts")?;

    generate_throttle_rate_chart()?;
    generate_ab_bucket_rate_chart()?;

    Ok(())
}

/// Observed share of excluded auctions for every configured throttle value
fn generate_throttle_rate_chart() -> Result<(), Box<dyn std::error::Error>> {
    // One partner per throttle step, so a single simulation covers the whole range
    let partners: Vec<PartnerParam> = THROTTLE_PARTNERS
        .iter()
        .map(|&(label, throttle)| PartnerParam::new(label).throttle(throttle))
        .collect();

    let mut generator = TrafficGenerator::new(TrafficParam::new(partners, 1)?, get_seed(61));
    let mut engine = seeded_engine(62);
    let mut logger = Logger::new();
    let stat = run_simulation(&mut engine, &mut generator, REQUESTS_PER_POINT, &mut logger);

    let observed: Vec<(f64, f64)> = PERCENT_STEPS
        .iter()
        .zip(THROTTLE_PARTNERS.iter())
        .map(|(p, (label, _))| (*p as f64, stat.throttle_rate(label)))
        .collect();
    let expected: Vec<(f64, f64)> = PERCENT_STEPS.iter().map(|p| (*p as f64, (100 - p) as f64 / 100.0)).collect();

    create_rate_chart(
        &observed,
        &expected,
        "Throttle: excluded share vs configured value",
        "charts/throttle_rate.png",
        "Configured throttle (%)",
        "Excluded share of auctions",
    )
}

/// Observed share of requests in the test bucket for every group size
fn generate_ab_bucket_rate_chart() -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = Logger::new();
    let mut observed = Vec::with_capacity(PERCENT_STEPS.len());
    for p in PERCENT_STEPS {
        let stat = ab_bucket_rate::simulate_group_size(&p.to_string(), REQUESTS_PER_POINT, &mut logger)?;
        observed.push((p as f64, stat.ab_test_rate()));
    }
    let expected: Vec<(f64, f64)> = PERCENT_STEPS.iter().map(|p| (*p as f64, *p as f64 / 100.0)).collect();

    create_rate_chart(
        &observed,
        &expected,
        "A/B overlay: bucket share vs group size",
        "charts/ab_bucket_rate.png",
        "Configured group size (%)",
        "Share of requests in test bucket",
    )
}

fn create_rate_chart(
    observed: &[(f64, f64)],
    expected: &[(f64, f64)],
    title: &str,
    filename: &str,
    x_label: &str,
    y_label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if observed.is_empty() {
        return Err("Cannot create chart: dataset is empty".into());
    }

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..100.0, 0.0..1.05)?;

    chart.configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(expected.iter().copied(), &BLACK.mix(0.4)))?
        .label("Expected")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK.mix(0.4)));

    chart.draw_series(observed.iter().map(|(x, y)| Circle::new((*x, *y), 4, BLUE.filled())))?
        .label(format!("Observed (n={} per point)", REQUESTS_PER_POINT))
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.filled()));

    chart.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;

    println!("Chart saved to {}", filename);

    Ok(())
}
