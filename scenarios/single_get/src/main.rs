use squall_runner::prelude::*;

fn main() -> SquallResult<()> {
    let target_url =
        std::env::var("TARGET_URL").unwrap_or_else(|_| "http://localhost:30080".to_string());

    let builder = ScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"), &target_url)
        .with_stage(parse_duration("3m")?, 200)
        .with_stage(parse_duration("10m")?, 200)
        .with_stage(parse_duration("5m")?, 0);

    run(builder)?;

    Ok(())
}
