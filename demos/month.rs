use elektrum::query::Granularity;
use elektrum::ElektrumPortal;

fn main() {
    let portal = ElektrumPortal::from_env_values();

    let readings = portal
        .fetch_month(Some(2024), Some(3), Some(Granularity::Day))
        .expect("fetch failed");

    for reading in &readings.consumed {
        println!("{} {:?}", reading.timestamp, reading.value);
    }
    println!("{}", readings.as_polars_df().unwrap());
}
