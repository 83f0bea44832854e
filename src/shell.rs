//! Interactive inspector over a single page image.
//!
//! The binary feeds it lines from a readline prompt; tests drive it directly.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::storage::AddMode;
use crate::types::{
    OffsetNumber,
    error::PageError,
    page::Page,
};
use crate::utils::hash::{live_items_digest, page_checksum};

pub const HELP: &str = r#"
Available commands:
  init [special]               - Reinitialize the page with optional special space
  load <file>                  - Load a page image from disk
  save <file>                  - Write the page image to disk
  add <text> [offnum] [overwrite]
                               - Add an item, optionally at a slot;
                                 quote text that contains spaces
  get <offnum>                 - Show the item stored at a slot
  del <offnum>                 - Delete one item, compacting the line pointers
  multidel <offnum>...         - Delete sorted items, compacting the line pointers
  nocompact <offnum>...        - Delete sorted items, keeping slot numbers
  dead <offnum>                - Mark an item dead
  repair                       - Defragment the data area
  items                        - List line pointers
  header                       - Show the page header
  free                         - Show free space
  checksum                     - Show page and item checksums
  validate                     - Validate the page header
  help, h                      - Show this help message
  exit, quit, q                - Exit the inspector

Use '\' at the end of a line for multiline input.
"#;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command '{0}', type 'help' for a list")]
    UnknownCommand(String),
}

impl ShellError {
    /// A fatal page error means the page image can no longer be trusted at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Page(err) if err.is_fatal())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Exit,
}

pub struct Shell {
    page: Page,
}

impl Shell {
    pub fn new(special_size: usize) -> Result<Self, ShellError> {
        Ok(Self {
            page: Page::new(special_size)?,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ShellError> {
        let bytes = fs::read(path.as_ref())?;
        Ok(Self {
            page: Page::from_bytes(&bytes)?,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn execute(&mut self, command: &str) -> Result<Outcome, ShellError> {
        let mut parts = command.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(Outcome::Continue(String::new()));
        };
        let args: Vec<&str> = parts.collect();

        let output = match verb.to_lowercase().as_str() {
            "exit" | "quit" | "q" => return Ok(Outcome::Exit),
            "help" | "h" => HELP.to_string(),
            "init" => {
                let special = match args.first() {
                    Some(arg) => arg
                        .parse()
                        .map_err(|_| ShellError::Usage("init [special]"))?,
                    None => 0,
                };
                self.page = Page::new(special)?;
                format!("initialized page with {} bytes of special space", special)
            }
            "load" => {
                let path = args.first().ok_or(ShellError::Usage("load <file>"))?;
                let bytes = fs::read(path)?;
                self.page = Page::from_bytes(&bytes)?;
                info!(path, "loaded page image");
                self.describe_validity()
            }
            "save" => {
                let path = args.first().ok_or(ShellError::Usage("save <file>"))?;
                fs::write(path, self.page.as_bytes())?;
                info!(path, "saved page image");
                format!("saved {} bytes to {}", self.page.as_bytes().len(), path)
            }
            "add" => self.add(command.trim_start()[verb.len()..].trim_start())?,
            "get" => {
                let offnum = parse_offnum(args.first(), "get <offnum>")?;
                match self.page.item(offnum) {
                    Some(item) => format!(
                        "{}: {:?} ({} bytes)",
                        offnum,
                        String::from_utf8_lossy(item),
                        item.len()
                    ),
                    None => format!("{}: no stored item", offnum),
                }
            }
            "del" => {
                let offnum = parse_offnum(args.first(), "del <offnum>")?;
                self.page.delete_item(offnum)?;
                format!("deleted {}", offnum)
            }
            "multidel" => {
                let offnums = parse_offnums(&args, "multidel <offnum>...")?;
                self.page.multi_delete(&offnums)?;
                format!("deleted {} items", offnums.len())
            }
            "nocompact" => {
                let offnums = parse_offnums(&args, "nocompact <offnum>...")?;
                self.page.delete_no_compact(&offnums)?;
                format!("deleted {} items, slot numbers kept", offnums.len())
            }
            "dead" => {
                let offnum = parse_offnum(args.first(), "dead <offnum>")?;
                self.page.mark_dead(offnum)?;
                format!("marked {} dead", offnum)
            }
            "repair" => {
                let unused = self.page.repair_fragmentation()?;
                format!("repaired, {} unused slots: {:?}", unused.len(), unused)
            }
            "items" => self.describe_items(),
            "header" => self.describe_header(),
            "free" => format!(
                "free space: {} (exact: {})",
                self.page.free_space(),
                self.page.exact_free_space()
            ),
            "checksum" => format!(
                "page crc32: {:08x}, items crc32: {:08x}",
                page_checksum(self.page.as_bytes()),
                live_items_digest(&self.page)
            ),
            "validate" => self.describe_validity(),
            _ => return Err(ShellError::UnknownCommand(verb.to_string())),
        };
        Ok(Outcome::Continue(output))
    }

    fn add(&mut self, rest: &str) -> Result<String, ShellError> {
        const USAGE: &str = "add <text> [offnum] [overwrite]";
        // Quoted text may hold spaces; bare text is a single word
        let (text, options) = match rest.strip_prefix('"') {
            Some(quoted) => quoted.split_once('"').ok_or(ShellError::Usage(USAGE))?,
            None => rest.split_once(char::is_whitespace).unwrap_or((rest, "")),
        };
        if text.is_empty() && !rest.starts_with('"') {
            return Err(ShellError::Usage(USAGE));
        }
        let args: Vec<&str> = options.split_whitespace().collect();
        let target = match args.first() {
            Some(arg) => Some(arg.parse().map_err(|_| ShellError::Usage(USAGE))?),
            None => None,
        };
        let mode = match args.get(1) {
            Some(&"overwrite") => AddMode::Overwrite,
            Some(_) => return Err(ShellError::Usage(USAGE)),
            None => AddMode::Shuffle,
        };
        if args.len() > 2 {
            return Err(ShellError::Usage(USAGE));
        }

        Ok(match self.page.add_item(text.as_bytes(), target, mode)? {
            Some(offnum) => format!("added at {}", offnum),
            None => "item not added (no room or slot unavailable)".to_string(),
        })
    }

    fn describe_header(&self) -> String {
        let header = self.page.header();
        format!(
            "lsn={} tli={} flags={:#06x} lower={} upper={} special={} page_size={} version={} prune_xid={}",
            header.lsn,
            header.tli,
            header.flags,
            header.lower,
            header.upper,
            header.special,
            header.page_size(),
            header.layout_version(),
            header.prune_xid
        )
    }

    fn describe_items(&self) -> String {
        let mut out = String::new();
        for (offnum, id) in self.page.item_ids() {
            let _ = writeln!(
                out,
                "{:>4}: off={:<5} len={:<5} state={:?}",
                offnum, id.offset, id.length, id.state
            );
        }
        if out.is_empty() {
            out.push_str("no line pointers");
        }
        out
    }

    fn describe_validity(&self) -> String {
        match self.page.verify_header() {
            Ok(()) if self.page.is_all_zero() => "header valid (all-zero page)".to_string(),
            Ok(()) => "header valid".to_string(),
            Err(err) => format!("header INVALID: {}", err),
        }
    }
}

fn parse_offnum(arg: Option<&&str>, usage: &'static str) -> Result<OffsetNumber, ShellError> {
    arg.ok_or(ShellError::Usage(usage))?
        .parse()
        .map_err(|_| ShellError::Usage(usage))
}

fn parse_offnums(args: &[&str], usage: &'static str) -> Result<Vec<OffsetNumber>, ShellError> {
    if args.is_empty() {
        return Err(ShellError::Usage(usage));
    }
    args.iter()
        .map(|arg| arg.parse().map_err(|_| ShellError::Usage(usage)))
        .collect()
}
