use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

// https://redis.io/commands/del
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl Executable for Del {
    fn exec(self, store: &Store) -> Frame {
        let count = store.delete(&self.keys);
        Frame::Integer(count as i64)
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut keys = vec![];

        loop {
            match parser.next_bytes() {
                Ok(key) => keys.push(key),
                Err(CommandParserError::EndOfStream) if !keys.is_empty() => {
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Self { keys })
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{Context, Registry};

    use super::*;

    fn del(ctx: &Context, keys: &[&'static str]) -> Frame {
        let args = keys.iter().map(|k| Frame::Bulk(Bytes::from(*k))).collect();
        Registry::with_basic_commands().dispatch(ctx, "DEL", args)
    }

    #[test]
    fn multiple_keys() {
        let frame = vec![
            Frame::Bulk(Bytes::from("foo")),
            Frame::Bulk(Bytes::from("bar")),
            Frame::Bulk(Bytes::from("baz")),
        ];
        let cmd = Del::try_from(&mut CommandParser::new("del", frame)).unwrap();
        assert_eq!(
            cmd,
            Del {
                keys: vec![
                    Bytes::from("foo"),
                    Bytes::from("bar"),
                    Bytes::from("baz")
                ]
            }
        );
    }

    #[test]
    fn existing_then_absent_key() {
        let ctx = Context::default();
        ctx.store.set("k".to_string(), Bytes::from("v"));

        assert_eq!(del(&ctx, &["k"]), Frame::Integer(1));
        assert_eq!(ctx.store.get("k"), None);
        assert_eq!(del(&ctx, &["k"]), Frame::Integer(0));
    }

    #[test]
    fn counts_only_existing_keys() {
        let ctx = Context::default();
        ctx.store.set("a".to_string(), Bytes::from("1"));
        ctx.store.set("c".to_string(), Bytes::from("3"));

        assert_eq!(del(&ctx, &["a", "b", "c"]), Frame::Integer(2));
    }

    #[test]
    fn zero_keys() {
        let err = Del::try_from(&mut CommandParser::new("del", vec![])).unwrap_err();
        assert_eq!(err, CommandParserError::EndOfStream);

        assert_eq!(
            del(&Context::default(), &[]),
            Frame::Error("ERR wrong number of arguments for 'del' command".to_string())
        );
    }

    #[test]
    fn invalid_frame() {
        let ctx = Context::default();
        ctx.store.set("foo".to_string(), Bytes::from("v"));
        let args = vec![Frame::Integer(42), Frame::Bulk(Bytes::from("foo"))];

        let res = Registry::with_basic_commands().dispatch(&ctx, "DEL", args);

        assert_eq!(
            res,
            Frame::Error(
                "ERR protocol error; invalid frame, expected simple or bulk string, got :42"
                    .to_string()
            )
        );
        // Nothing is deleted when any argument is invalid.
        assert!(ctx.store.exists("foo"));
    }
}
