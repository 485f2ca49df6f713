//! Metadata pass
//!
//!     Collects the document fields (`*title*`, `*author*`, `*abstract*`, ...). Each paired
//!     field captures the text up to its closer with whitespace collapsed; `*logowidth*` takes
//!     a single number. The first occurrence of a field wins.

use super::{Visitor, Walker};
use crate::context::Metadata;
use crate::error::CompileError;
use crate::lexing::{expect_closing, read_argument, Command, CommandToken, MetaField, TokenReader};
use crate::loader::Sources;
use std::path::Path;
use tracing::debug;

pub fn collect<S: Sources + ?Sized>(
    sources: &S,
    root: &Path,
    max_include_depth: usize,
) -> Result<Metadata, CompileError> {
    let mut pass = MetadataPass::default();
    Walker::new(sources, max_include_depth).walk(root, &mut pass)?;
    Ok(pass.metadata)
}

#[derive(Default)]
struct MetadataPass {
    metadata: Metadata,
}

impl MetadataPass {
    fn slot(&mut self, field: MetaField) -> &mut Option<String> {
        let metadata = &mut self.metadata;
        match field {
            MetaField::Title => &mut metadata.title,
            MetaField::Subtitle => &mut metadata.subtitle,
            MetaField::Author => &mut metadata.author,
            MetaField::Address => &mut metadata.address,
            MetaField::Date => &mut metadata.date,
            MetaField::Abstract => &mut metadata.abstract_text,
            MetaField::StyleFile => &mut metadata.stylefile,
            MetaField::Logo => &mut metadata.logo,
        }
    }
}

impl Visitor for MetadataPass {
    fn command(
        &mut self,
        command: CommandToken,
        closer: Option<&str>,
        reader: &mut TokenReader<'_>,
        _file: &Path,
    ) -> Result<(), CompileError> {
        let Some(closer) = closer else {
            return Ok(());
        };
        match command.command {
            Command::Meta(field) => {
                let Some(text) = reader.read_raw_until(closer) else {
                    debug!(field = field.name(), "metadata field runs to end of input");
                    return Ok(());
                };
                let slot = self.slot(field);
                if slot.is_some() {
                    debug!(field = field.name(), "ignoring repeated metadata field");
                } else {
                    *slot = Some(text);
                }
            }
            Command::LogoWidth => {
                let value = read_argument(reader);
                let _ = expect_closing(reader, Command::LogoWidth);
                match value.as_deref().map(str::parse::<u32>) {
                    Some(Ok(width)) if self.metadata.logo_width.is_none() => {
                        self.metadata.logo_width = Some(width);
                    }
                    Some(Ok(_)) => debug!("ignoring repeated logo width"),
                    _ => debug!(value = ?value, "logo width is not a number"),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySources;

    fn metadata(source: &str) -> Metadata {
        let sources = MemorySources::new().with("main.sm", source);
        collect(&sources, Path::new("main.sm"), 8).unwrap()
    }

    #[test]
    fn test_collects_fields() {
        let meta = metadata(
            "*title* A   Study\n of Stars */title* *author*Jo Bloggs*/author* \
             *abstract* We look up. */abstract* *logowidth* 120 */logowidth*",
        );
        assert_eq!(meta.title.as_deref(), Some("A Study of Stars"));
        assert_eq!(meta.author.as_deref(), Some("Jo Bloggs"));
        assert_eq!(meta.abstract_text.as_deref(), Some("We look up."));
        assert_eq!(meta.logo_width, Some(120));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let meta = metadata("*title* One */title* *title* Two */title*");
        assert_eq!(meta.title.as_deref(), Some("One"));
    }

    #[test]
    fn test_style_alias_closes_with_own_name() {
        let meta = metadata("*style* paper.css */style* *date* May */date*");
        assert_eq!(meta.stylefile.as_deref(), Some("paper.css"));
        assert_eq!(meta.date.as_deref(), Some("May"));
    }

    #[test]
    fn test_body_text_is_ignored() {
        let meta = metadata("*section* *section-name* a *section-title* A *p* text */section*");
        assert_eq!(meta, Metadata::default());
    }

    #[test]
    fn test_fields_in_included_files() {
        let sources = MemorySources::new()
            .with("main.sm", "*input* front.sm */input*")
            .with("front.sm", "*subtitle* Notes */subtitle*");
        let meta = collect(&sources, Path::new("main.sm"), 8).unwrap();
        assert_eq!(meta.subtitle.as_deref(), Some("Notes"));
    }
}
