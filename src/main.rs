use milpkit::{InstanceFile, logging};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("Usage: milpkit <instance.yaml>")?;

    logging::init();

    let file = InstanceFile::load(&path)?;
    let report = file.problem.run(&file.solver)?;

    println!("{}", serde_yaml::to_string(&report)?);
    Ok(())
}
