use rw_core::time::{time_as_relative_string, utcnow};

pub fn run(timestamp: &str, until: Option<&str>) -> Result<(), String> {
    let start = super::parse_timestamp(timestamp)?;
    let end = match until {
        Some(raw) => super::parse_timestamp(raw)?,
        None => utcnow(),
    };
    println!("{}", time_as_relative_string(start, end));
    Ok(())
}
