use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use mirrorlink_command::{CommandChannel, CommandContext};
use mirrorlink_transmit::{FrameTransmitter, TransmitError, TransmitterConfig};
use mirrorlink_transport::ConnectionState;
use mirrorlink_wire::commands::{DISABLE_FRAMES, ENABLE_FRAMES, SHUTDOWN};
use tracing::{info, warn};

use crate::cmd::{mapping_config, on_interrupt, RunArgs};
use crate::console::{self, ConsoleCommand, ConsoleReader};
use crate::exit::{command_error, io_error, transmit_error, CliResult, SUCCESS};
use crate::output::{print_run_summary, OutputFormat, RunSummary};
use crate::pattern::TestPatternSource;

const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Flags flipped by command handlers and read back by the event loop.
#[derive(Default)]
struct Controls {
    frames_enabled: Cell<bool>,
    shutdown: Cell<bool>,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut transmitter = if args.no_frames {
        None
    } else {
        open_transmitter(&args)
    };
    let publishing = transmitter.is_some();

    let controls = Rc::new(Controls::default());
    controls.frames_enabled.set(args.frames_enabled && publishing);

    let mut channel = CommandChannel::new();
    register_handlers(&mut channel, publishing, &controls)?;
    channel.set_response_observer(|frame, command| {
        info!(
            id = frame.id,
            command = command.unwrap_or("<untracked>"),
            success = frame.is_success(),
            message = %frame.content_str(),
            "controller replied"
        );
    });

    let stop = channel.stop_handle();
    on_interrupt(move || stop.request())?;

    channel
        .connect(&args.host, args.port)
        .map_err(|err| command_error("connect failed", err))?;
    channel
        .send_start_work_notify()
        .map_err(|err| command_error("start notification failed", err))?;

    let mut console = if args.console {
        eprintln!("console commands:\n{}", console::usage());
        Some(ConsoleReader::start().map_err(|err| io_error("console start failed", err))?)
    } else {
        None
    };

    let mut source = TestPatternSource::new(args.width, args.height);
    let interval = Duration::from_secs(1) / args.fps;
    let mut next_frame = Instant::now();
    let mut frames_published = 0u64;

    while channel.is_running() {
        let busy = channel
            .step()
            .map_err(|err| command_error("command loop failed", err))?;

        if controls.shutdown.get() {
            // The reply went out during this pass; the next one tears down.
            channel.stop();
        }

        if let Some(console) = &console {
            for line in console.drain() {
                handle_console_line(&line, &mut channel, publishing, &controls);
            }
        }

        if let Some(tx) = transmitter.as_mut() {
            tx.set_enabled(controls.frames_enabled.get());
            let now = Instant::now();
            if tx.is_enabled() && channel.state() == ConnectionState::Connected && now >= next_frame
            {
                match tx.send_frame(&mut source, &mut channel) {
                    Ok(Some(_)) => frames_published += 1,
                    Ok(None) => {}
                    // The command channel is gone, so no later frame can be announced.
                    Err(err @ TransmitError::Notify(_)) => {
                        return Err(transmit_error("frame notification failed", err))
                    }
                    Err(err) => warn!(error = %err, sequence = tx.sequence(), "frame dropped"),
                }
                next_frame += interval;
                if next_frame < now {
                    next_frame = now + interval;
                }
            }
        }

        if !busy {
            thread::sleep(IDLE_SLEEP);
        }
    }

    if let Some(console) = console.as_mut() {
        console.stop();
    }

    let summary = RunSummary {
        status: "stopped",
        frames_published,
        last_sequence: transmitter.as_ref().map_or(0, FrameTransmitter::sequence),
        requests_outstanding: channel.dispatcher().issuer().outstanding_len(),
    };
    channel.close();
    drop(transmitter);

    info!(frames = summary.frames_published, "event loop stopped");
    print_run_summary(&summary, format);
    Ok(SUCCESS)
}

/// Create the shared frame channel. Failure only disables publishing.
fn open_transmitter(args: &RunArgs) -> Option<FrameTransmitter> {
    let config = TransmitterConfig {
        mapping_name: args.shm_name.clone(),
        max_frame_size: args.max_frame_size,
        mapping: mapping_config(args.shm_kind, args.shm_dir.as_ref()),
    };

    match FrameTransmitter::new(&config) {
        Ok(tx) => Some(tx),
        Err(err) => {
            warn!(error = %err, name = %args.shm_name, "frame publishing disabled");
            None
        }
    }
}

fn register_handlers(
    channel: &mut CommandChannel,
    publishing: bool,
    controls: &Rc<Controls>,
) -> CliResult<()> {
    let enable = Rc::clone(controls);
    channel
        .register_command(ENABLE_FRAMES, move |ctx: &mut CommandContext<'_>| {
            if publishing {
                enable.frames_enabled.set(true);
                ctx.succeed("");
            } else {
                ctx.fail("frame publishing unavailable");
            }
        })
        .map_err(|err| command_error("register failed", err))?;

    let disable = Rc::clone(controls);
    channel
        .register_command(DISABLE_FRAMES, move |ctx: &mut CommandContext<'_>| {
            disable.frames_enabled.set(false);
            ctx.succeed("");
        })
        .map_err(|err| command_error("register failed", err))?;

    let shutdown = Rc::clone(controls);
    channel
        .register_command(SHUTDOWN, move |ctx: &mut CommandContext<'_>| {
            info!(id = ctx.id(), "shutdown requested by controller");
            shutdown.shutdown.set(true);
            ctx.succeed("");
        })
        .map_err(|err| command_error("register failed", err))?;

    Ok(())
}

fn handle_console_line(
    line: &str,
    channel: &mut CommandChannel,
    publishing: bool,
    controls: &Controls,
) {
    match console::parse_line(line) {
        Ok(ConsoleCommand::Send { command, content }) => {
            match channel.send_request(&command, content.as_bytes()) {
                Ok(id) => info!(id, command = %command, "request queued"),
                Err(err) => warn!(error = %err, command = %command, "request not sent"),
            }
        }
        Ok(ConsoleCommand::Frames(enabled)) => {
            if enabled && !publishing {
                warn!("frame publishing unavailable");
            } else {
                controls.frames_enabled.set(enabled);
            }
        }
        Ok(ConsoleCommand::Quit) => channel.stop(),
        Ok(ConsoleCommand::Help) => eprintln!("{}", console::usage()),
        Err(message) => warn!("{message}"),
    }
}
