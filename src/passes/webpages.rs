//! Webpage pass
//!
//!     `*webpage* NAME Title words */webpage*` adds an entry to the top-level navigation of
//!     the hypertext output.

use super::{Visitor, Walker};
use crate::context::Webpage;
use crate::error::CompileError;
use crate::lexing::{read_argument, Command, CommandToken, TokenReader};
use crate::loader::Sources;
use std::path::Path;
use tracing::debug;

pub fn collect<S: Sources + ?Sized>(
    sources: &S,
    root: &Path,
    max_include_depth: usize,
) -> Result<Vec<Webpage>, CompileError> {
    let mut pass = WebpagePass::default();
    Walker::new(sources, max_include_depth).walk(root, &mut pass)?;
    Ok(pass.pages)
}

#[derive(Default)]
struct WebpagePass {
    pages: Vec<Webpage>,
}

impl Visitor for WebpagePass {
    fn command(
        &mut self,
        command: CommandToken,
        closer: Option<&str>,
        reader: &mut TokenReader<'_>,
        _file: &Path,
    ) -> Result<(), CompileError> {
        if command.command != Command::Webpage {
            return Ok(());
        }
        let Some(closer) = closer else {
            return Ok(());
        };
        let Some(name) = read_argument(reader) else {
            debug!("webpage entry without a name");
            return Ok(());
        };
        let title = reader.read_raw_until(closer).unwrap_or_default();
        self.pages.push(Webpage { name, title });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySources;

    #[test]
    fn test_collects_entries_in_order() {
        let sources = MemorySources::new().with(
            "main.sm",
            "*webpage* home Home page */webpage* text *webpage* pubs Papers*/webpage*",
        );
        let pages = collect(&sources, Path::new("main.sm"), 8).unwrap();
        assert_eq!(
            pages,
            vec![
                Webpage {
                    name: "home".to_string(),
                    title: "Home page".to_string()
                },
                Webpage {
                    name: "pubs".to_string(),
                    title: "Papers".to_string()
                },
            ]
        );
    }
}
