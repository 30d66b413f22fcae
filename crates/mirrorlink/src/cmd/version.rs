use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    transmit: bool,
    backings: &'static [&'static str],
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("MIRRORLINK_BUILD_TARGET").unwrap_or("unknown"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        transmit: cfg!(feature = "transmit"),
        backings: &["file", "shm"],
    };

    if matches!(format, OutputFormat::Json) {
        println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(SUCCESS);
    }

    if !args.extended {
        println!("{} {}", out.name, out.version);
        return Ok(SUCCESS);
    }

    println!("name: {}", out.name);
    println!("version: {}", out.version);
    println!("target: {}", out.target);
    println!("target_os: {}", out.target_os);
    println!("target_arch: {}", out.target_arch);
    println!("features: transmit={}, cli=true", out.transmit);
    println!("backings: {}", out.backings.join(", "));

    Ok(SUCCESS)
}
