use elektrum::ElektrumPortal;

fn main() {
    let portal = ElektrumPortal::from_env_values();

    let readings = portal.fetch_year(None).expect("fetch failed");
    println!("readings: {:?}", readings);
}
