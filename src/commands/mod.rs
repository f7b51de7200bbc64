pub mod del;
pub mod executable;
pub mod get;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::collections::HashMap;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use del::Del;
use get::Get;
use ping::Ping;
use set::Set;

/// State every handler runs against.
#[derive(Clone, Default)]
pub struct Context {
    pub store: Store,
}

impl Context {
    pub fn new(store: Store) -> Context {
        Context { store }
    }
}

/// A command implementation: receives the request arguments after the command name and
/// returns exactly one reply.
pub type Handler = Box<dyn Fn(&Context, Vec<Frame>) -> Frame + Send + Sync>;

struct Registration {
    handler: Handler,
    write: bool,
}

/// Maps upper-cased command names to their handlers.
#[derive(Default)]
pub struct Registry {
    commands: HashMap<String, Registration>,
}

impl Registry {
    pub fn new() -> Registry {
        Self::default()
    }

    /// A registry with `GET`, `SET`, `DEL` and `PING`.
    pub fn with_basic_commands() -> Registry {
        let mut registry = Registry::new();

        registry.register("GET", |ctx, args| run::<Get>("get", ctx, args));
        registry.register("PING", |ctx, args| run::<Ping>("ping", ctx, args));
        registry.register_write("SET", |ctx, args| run::<Set>("set", ctx, args));
        registry.register_write("DEL", |ctx, args| run::<Del>("del", ctx, args));

        registry
    }

    /// Registers a command that does not modify the store.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Context, Vec<Frame>) -> Frame + Send + Sync + 'static,
    {
        self.insert(name, Box::new(handler), false);
    }

    /// Registers a command that modifies the store. Successful executions of these commands
    /// are the ones recorded in the append-only file.
    pub fn register_write<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Context, Vec<Frame>) -> Frame + Send + Sync + 'static,
    {
        self.insert(name, Box::new(handler), true);
    }

    fn insert(&mut self, name: &str, handler: Handler, write: bool) {
        self.commands
            .insert(name.to_uppercase(), Registration { handler, write });
    }

    pub fn is_write(&self, name: &str) -> bool {
        self.commands
            .get(&name.to_uppercase())
            .is_some_and(|registration| registration.write)
    }

    pub fn dispatch(&self, ctx: &Context, name: &str, args: Vec<Frame>) -> Frame {
        match self.commands.get(&name.to_uppercase()) {
            Some(registration) => (registration.handler)(ctx, args),
            None => CommandParserError::UnknownCommand {
                command: name.to_string(),
            }
            .into(),
        }
    }

    /// Executes a full request, an array whose head is the command name.
    pub fn execute(&self, ctx: &Context, request: Frame) -> Frame {
        match parse_request(request) {
            Ok((name, args)) => self.dispatch(ctx, &name, args),
            Err(err) => err.into(),
        }
    }
}

/// Splits a request into its command name and arguments.
pub fn parse_request(request: Frame) -> Result<(String, Vec<Frame>), CommandParserError> {
    // Clients send commands to the Redis server as RESP arrays.
    let frames = match request {
        Frame::Array(array) => array,
        frame => {
            return Err(CommandParserError::InvalidFrame {
                expected: "array".to_string(),
                actual: frame,
            })
        }
    };

    let mut parts = frames.into_iter();
    let name = match parts.next() {
        Some(Frame::Simple(s)) => s,
        Some(Frame::Bulk(bytes)) => str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(CommandParserError::InvalidUTF8String)?,
        Some(frame) => {
            return Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            })
        }
        None => return Err(CommandParserError::EmptyCommand),
    };

    Ok((name, parts.collect()))
}

/// Parses `args` into the command `C`, rejecting leftovers, and executes it.
fn run<C>(name: &'static str, ctx: &Context, args: Vec<Frame>) -> Frame
where
    C: Executable,
    for<'a> C: TryFrom<&'a mut CommandParser, Error = CommandParserError>,
{
    let mut parser = CommandParser::new(name, args);

    let cmd = match C::try_from(&mut parser) {
        Ok(cmd) => cmd,
        Err(CommandParserError::EndOfStream) => return parser.wrong_arity().into(),
        Err(err) => return err.into(),
    };

    if let Err(err) = parser.finish() {
        return err.into();
    }

    cmd.exec(&ctx.store)
}

pub struct CommandParser {
    command: &'static str,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    pub fn new(command: &'static str, args: Vec<Frame>) -> CommandParser {
        CommandParser {
            command,
            parts: args.into_iter(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }

    fn has_remaining(&self) -> bool {
        self.parts.len() > 0
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.next_frame()? {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongNumberOfArguments {
            command: self.command.to_string(),
        }
    }

    /// Ensures every argument was consumed.
    fn finish(&self) -> Result<(), CommandParserError> {
        if self.has_remaining() {
            return Err(self.wrong_arity());
        }
        Ok(())
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("protocol error; empty command")]
    EmptyCommand,
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}

impl From<CommandParserError> for Frame {
    fn from(err: CommandParserError) -> Frame {
        // The message may quote client input, and an error frame ends at the first CRLF.
        let message = format!("ERR {}", err).replace(&['\r', '\n'][..], " ");
        Frame::Error(message)
    }
}
