use std::{
    io::{BufRead, BufReader, Write},
    num::ParseIntError,
};

use async_std::{
    channel::{self, Receiver, Sender},
    io,
};
use clap::Args;
use clio::{Input, Output};
use colored::Colorize;
use thiserror::Error;

use crate::bus::{Bus, MachineConfig, MapError};
use crate::device::{
    led::{GLYPH_OFF, GLYPH_ON},
    Addr, Event, Word,
};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("unable to read provided input")]
    Input(std::io::Error),
    #[error("error reading stdin")]
    StdIn(std::io::Error),
    #[error("unable to write output")]
    Output(std::io::Error),
    #[error("unable to finalize output")]
    Finish(#[from] clio::Error),
    #[error(transparent)]
    Map(#[from] MapError),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    #[clap(flatten)]
    machine: MachineConfig,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Monitor command script
    #[clap(value_parser, default_value = "-")]
    input: Input,
    #[clap(short, long, value_parser, default_value = "-")]
    output: Output,
    #[clap(flatten)]
    machine: MachineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Hash)]
enum SingleCmd {
    Load,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Hash)]
enum DoubleCmd {
    Store,
}

/// One run of the machine, driven a command at a time.
pub struct Session {
    config: MachineConfig,
    bus: Bus,
    quit: bool,
}

impl Session {
    pub fn new(config: MachineConfig) -> Result<Self, MapError> {
        let bus = config.build()?;
        Ok(Session {
            config,
            bus,
            quit: false,
        })
    }

    #[cfg(test)]
    pub fn bus(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn finished(&self) -> bool {
        self.quit
    }

    pub fn execute<W: Write>(&mut self, input: &str, out: &mut W) -> Result<(), MonitorError> {
        let input = input.trim();
        if input.starts_with('#') {
            return Ok(());
        }

        match input.split_once(' ') {
            Some((cmd, args)) => match cmd {
                "STORE" => self.double_arg(DoubleCmd::Store, args, out),
                "LOAD" => self.single_arg(SingleCmd::Load, args, out),
                "RECV" => self.single_arg(SingleCmd::Recv, args, out),
                _ => unrecognized(cmd, out),
            },
            None => match input {
                "MAP" => {
                    for device in self.bus.devices() {
                        let window = device.window();
                        writeln!(
                            out,
                            "{:#010X}..={:#010X} {}",
                            window.start(),
                            window.end(),
                            device.name()
                        )
                        .map_err(MonitorError::Output)?;
                    }
                    Ok(())
                }
                "DUMP" => {
                    for device in self.bus.devices() {
                        writeln!(out, "{device}").map_err(MonitorError::Output)?;
                    }
                    Ok(())
                }
                "RESET" => {
                    self.bus = self.config.build()?;
                    log::info!("machine reset");
                    writeln!(out, "RESET").map_err(MonitorError::Output)
                }
                "QUIT" => {
                    self.quit = true;
                    Ok(())
                }
                "HELP" => help(out),
                "" => Ok(()),
                cmd => unrecognized(cmd, out),
            },
        }
    }

    fn single_arg<W: Write>(
        &mut self,
        cmd: SingleCmd,
        arg: &str,
        out: &mut W,
    ) -> Result<(), MonitorError> {
        match cmd {
            SingleCmd::Load => {
                let addr = match parse_u32(arg.trim()) {
                    Ok(addr) => addr,
                    Err(_) => return invalid("unable to parse address", out),
                };

                match self.bus.load(addr) {
                    Ok(value) => {
                        writeln!(out, "{addr:#010X}: {value:#04X}").map_err(MonitorError::Output)
                    }
                    Err(fault) => {
                        log::warn!("{fault}");
                        writeln!(out, "{}", fault.to_string().red()).map_err(MonitorError::Output)
                    }
                }
            }
            SingleCmd::Recv => {
                for byte in arg.trim().bytes() {
                    if let Err(fault) = self.bus.receive(byte) {
                        log::warn!("{fault}");
                        return writeln!(out, "{}", fault.to_string().red())
                            .map_err(MonitorError::Output);
                    }
                }
                Ok(())
            }
        }
    }

    fn double_arg<W: Write>(
        &mut self,
        cmd: DoubleCmd,
        args: &str,
        out: &mut W,
    ) -> Result<(), MonitorError> {
        let (arg1, arg2) = match args.trim().split_once(',') {
            Some(args) => args,
            None => return invalid("expected two arguments, found one", out),
        };

        match cmd {
            DoubleCmd::Store => {
                let addr: Addr = match parse_u32(arg1.trim()) {
                    Ok(addr) => addr,
                    Err(_) => return invalid("unable to parse address", out),
                };
                let value: Word = match parse_u32(arg2.trim()) {
                    Ok(val) => val,
                    Err(_) => return invalid("unable to parse value", out),
                };

                match self.bus.store(addr, value) {
                    Ok(Some(event)) => {
                        writeln!(out, "{}", render(&event)).map_err(MonitorError::Output)
                    }
                    Ok(None) => Ok(()),
                    Err(fault) => {
                        log::warn!("{fault}");
                        writeln!(out, "{}", fault.to_string().red()).map_err(MonitorError::Output)
                    }
                }
            }
        }
    }
}

/// Formats a device event for the terminal, lit LEDs highlighted.
fn render(event: &Event) -> String {
    match event {
        Event::Leds(state) => {
            let lamps: String = state
                .lamps()
                .map(|on| {
                    if on {
                        format!("{} ", GLYPH_ON.to_string().red().bold())
                    } else {
                        format!("{GLYPH_OFF} ")
                    }
                })
                .collect();
            format!("LED State: {lamps} [{:#x}]", state.0)
        }
        other => other.to_string(),
    }
}

fn invalid<W: Write>(reason: &str, out: &mut W) -> Result<(), MonitorError> {
    writeln!(out, "{}: {reason}", "INVALID ARGUMENT".red()).map_err(MonitorError::Output)
}

fn unrecognized<W: Write>(cmd: &str, out: &mut W) -> Result<(), MonitorError> {
    writeln!(out, "{}: {cmd}", "UNRECOGNIZED COMMAND".red()).map_err(MonitorError::Output)
}

fn help<W: Write>(out: &mut W) -> Result<(), MonitorError> {
    writeln!(
        out,
        "\
        STORE <addr>, <val> : Stores `val` at the address `addr`\n\
        LOAD <addr>         : Loads the byte at the address `addr`\n\
        RECV <text>         : Delivers `text` to the UART receiver\n\
        MAP                 : Lists the mapped devices\n\
        DUMP                : Dumps the state of every device\n\
        RESET               : Starts over with freshly mapped devices\n\
        QUIT                : Quits the program\n\
        HELP                : Prints this message\
    "
    )
    .map_err(MonitorError::Output)
}

pub fn parse_u32(int: &str) -> Result<u32, ParseIntError> {
    if let Some(int) = int.strip_prefix("0b") {
        u32::from_str_radix(int, 2)
    } else if let Some(int) = int.strip_prefix("0o") {
        u32::from_str_radix(int, 8)
    } else if let Some(int) = int.strip_prefix("0x") {
        u32::from_str_radix(int, 16)
    } else {
        int.parse()
    }
}

/// Runs a command script to completion.
pub fn run(args: RunArgs) -> Result<(), MonitorError> {
    let RunArgs {
        input,
        mut output,
        machine,
    } = args;
    let mut session = Session::new(machine)?;

    {
        let mut out = output.lock();
        for line in BufReader::new(input).lines() {
            let line = line.map_err(MonitorError::Input)?;
            session.execute(&line, &mut out)?;
            if session.finished() {
                break;
            }
        }
    }

    output.finish()?;
    Ok(())
}

/// Interactive monitor on stdin/stdout.
pub async fn monitor(args: MonitorArgs) -> Result<(), MonitorError> {
    let mut session = Session::new(args.machine)?;
    let mut stdout = std::io::stdout();

    prompt(&mut stdout)?;
    let stdin = spawn_stdin_channel();

    while let Ok(line) = stdin.recv().await {
        let line = line.map_err(MonitorError::StdIn)?;
        session.execute(&line, &mut stdout)?;

        if session.finished() {
            break;
        }
        prompt(&mut stdout)?;
    }

    log::info!("monitor closed");
    Ok(())
}

fn prompt<W: Write>(out: &mut W) -> Result<(), MonitorError> {
    write!(out, "> ").map_err(MonitorError::Output)?;
    out.flush().map_err(MonitorError::Output)
}

fn spawn_stdin_channel() -> Receiver<std::io::Result<String>> {
    let (tx, rx) = channel::unbounded();
    async_std::task::spawn(watch_input(tx));
    rx
}

async fn watch_input(tx: Sender<std::io::Result<String>>) {
    loop {
        let mut buffer = String::new();
        match io::stdin().read_line(&mut buffer).await {
            // EOF closes the channel
            Ok(0) => break,
            Ok(_) => {
                if tx.send(Ok(buffer)).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err)).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_u32("0xFFFF0090"), Ok(0xFFFF_0090));
        assert_eq!(parse_u32("0b101"), Ok(5));
        assert_eq!(parse_u32("0o17"), Ok(15));
        assert_eq!(parse_u32("42"), Ok(42));
        assert!(parse_u32("0x").is_err());
        assert!(parse_u32("LED").is_err());
    }

    #[test]
    fn plain_render_matches_display() {
        colored::control::set_override(false);
        let event = Event::Leds(crate::device::LedState(0x81));
        assert_eq!(render(&event), event.to_string());
    }
}
