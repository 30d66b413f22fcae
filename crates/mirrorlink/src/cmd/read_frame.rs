use mirrorlink_shm::{FrameMapping, FRAME_HEADER_SIZE};
use tracing::debug;

use crate::cmd::{mapping_config, ReadFrameArgs};
use crate::exit::{io_error, shm_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame_header, OutputFormat};

pub fn run(args: ReadFrameArgs, format: OutputFormat) -> CliResult<i32> {
    let capacity = FRAME_HEADER_SIZE
        .checked_add(args.max_frame_size)
        .ok_or_else(|| CliError::new(USAGE, "max frame size is too large"))?;
    let config = mapping_config(args.kind, args.dir.as_ref());

    let mapping = FrameMapping::open_with_config(&args.shm_name, capacity, &config)
        .map_err(|err| shm_error("open failed", err))?;

    let mut payload = vec![0u8; mapping.max_payload()];
    let header = mapping
        .read_frame(&mut payload)
        .map_err(|err| shm_error("read failed", err))?;
    let payload = &payload[..header.frame_size as usize];
    debug!(
        sequence = header.sequence,
        bytes = payload.len(),
        "frame read"
    );

    if let Some(path) = &args.out {
        std::fs::write(path, payload).map_err(|err| io_error("write failed", err))?;
    }

    print_frame_header(&header, mapping.identity(), payload, format);
    Ok(SUCCESS)
}
