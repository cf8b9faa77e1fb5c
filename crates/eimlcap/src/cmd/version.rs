use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("eimlcap {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: eimlcap");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("EIMLCAP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: capture={}, cli=true",
        cfg!(feature = "capture")
    );
    println!(
        "frames: jpeg={}, eiml={}",
        String::from_utf8_lossy(eimlcap_frame::JPEG_SIGNATURE_B64),
        String::from_utf8_lossy(eimlcap_frame::EIML_SIGNATURE_B64)
    );

    Ok(SUCCESS)
}
