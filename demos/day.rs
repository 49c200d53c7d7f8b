use elektrum::ElektrumPortal;

fn main() {
    tracing_subscriber::fmt::init();

    let portal = ElektrumPortal::from_env_values();

    // Yesterday, hour by hour.
    let readings = portal.fetch_day(None, None, None).expect("fetch failed");
    println!("readings: {:?}", readings);
    println!("{}", readings.as_polars_df().unwrap());
}
