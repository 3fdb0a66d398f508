//! Trivial line-editing shell: a thin stand-in for the interactive
//! shell named in spec.md §1, enough to poke the kernel core under
//! QEMU from the UART. Not part of the tested core (spec §6 ambient
//! note) -- no unit tests, same as the other bare-metal-only glue.

use alloc::{string::String, vec::Vec};

use crate::{mm::heap, process::table};

const PROMPT: &str = "kernel> ";
const MAX_LINE: usize = 128;

/// Poll the UART for one line at a time and dispatch it. Called from
/// the idle loop; never blocks longer than one byte read.
pub struct Shell {
    line: String,
}

impl Shell {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
        }
    }

    /// Print the prompt once, at boot.
    pub fn start(&self) {
        crate::print!("{PROMPT}");
    }

    /// Drain whatever bytes are waiting on the UART RX ring, echoing
    /// and line-editing as it goes; dispatches on each `\r`/`\n`.
    pub fn poll(&mut self) {
        while let Some(byte) = crate::serial::try_read_byte() {
            match byte {
                b'\r' | b'\n' => {
                    crate::print!("\n");
                    let line = core::mem::take(&mut self.line);
                    dispatch(line.trim());
                    crate::print!("{PROMPT}");
                }
                0x08 | 0x7f => {
                    // backspace/DEL
                    if self.line.pop().is_some() {
                        crate::print!("\u{8} \u{8}");
                    }
                }
                byte if (byte as char).is_ascii() && self.line.len() < MAX_LINE => {
                    self.line.push(byte as char);
                    crate::print!("{}", byte as char);
                }
                _ => {}
            }
        }
    }
}

fn dispatch(line: &str) {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return;
    };
    let args: Vec<&str> = words.collect();

    match cmd {
        "help" => crate::print!(
            "commands: help ls cat write rm ps free echo\n"
        ),
        "ls" => {
            for name in crate::fs::list() {
                crate::print!("{name}\n");
            }
        }
        "cat" => match args.first() {
            Some(name) => match crate::fs::read(name) {
                Some(bytes) => {
                    for byte in bytes {
                        crate::print!("{}", byte as char);
                    }
                    crate::print!("\n");
                }
                None => crate::print!("cat: {name}: no such file\n"),
            },
            None => crate::print!("usage: cat <name>\n"),
        },
        "write" => {
            if let Some((name, contents)) = args.split_first() {
                let joined = contents.join(" ");
                crate::fs::write(name, joined.as_bytes());
            } else {
                crate::print!("usage: write <name> <contents...>\n");
            }
        }
        "rm" => match args.first() {
            Some(name) => {
                if !crate::fs::remove(name) {
                    crate::print!("rm: {name}: no such file\n");
                }
            }
            None => crate::print!("usage: rm <name>\n"),
        },
        "ps" => {
            crate::print!("pid\tstate\tcpu_time\tname\n");
            table::for_each_pid(|pid, state, cpu_time, name| {
                crate::print!("{pid}\t{state:?}\t{cpu_time}\t{name}\n");
            });
        }
        "free" => crate::print!("heap free: {} bytes\n", heap::free_bytes()),
        "echo" => crate::print!("{}\n", args.join(" ")),
        "" => {}
        other => crate::print!("{other}: command not found\n"),
    }
}
