//! Fast-import stream serialization: spec.md §6.
//!
//! The serializer itself is out of scope per spec.md §1 ("only the in-memory
//! event model it consumes is described"); this is the minimal grammar
//! writer needed to turn that event model into bytes `git fast-import`
//! accepts.

use std::io::Write;

use crate::errors::OutputError;
use crate::model::{Event, FileOp, FileOpKind};

fn write_data(w: &mut impl Write, text: &str) -> Result<(), OutputError> {
    writeln!(w, "data {}", text.len())?;
    w.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(w)?;
    }
    Ok(())
}

fn write_fileop(w: &mut impl Write, op: &FileOp) -> Result<(), OutputError> {
    match op.op {
        FileOpKind::Modify => {
            let mode = op.mode.as_deref().unwrap_or("100644");
            let mark = op.blob_mark.ok_or(OutputError::DanglingMark(0))?;
            writeln!(w, "M {mode} :{mark} {}", op.path)?;
        }
        FileOpKind::Delete => writeln!(w, "D {}", op.path)?,
        FileOpKind::DeleteAll => writeln!(w, "deleteall")?,
        FileOpKind::Rename => {
            writeln!(w, "R {} {}", op.source.as_deref().unwrap_or(""), op.target.as_deref().unwrap_or(""))?;
        }
        FileOpKind::Copy => {
            writeln!(w, "C {} {}", op.source.as_deref().unwrap_or(""), op.target.as_deref().unwrap_or(""))?;
        }
        FileOpKind::Note => {}
    }
    Ok(())
}

/// Write one [`Event`] in `git fast-import` grammar.
pub fn write_event(w: &mut impl Write, event: &Event) -> Result<(), OutputError> {
    match event {
        Event::Blob(blob) => {
            writeln!(w, "blob")?;
            writeln!(w, "mark :{}", blob.mark)?;
            writeln!(w, "data {}", blob.data.len())?;
            w.write_all(&blob.data)?;
            writeln!(w)?;
        }
        Event::Commit(commit) => {
            writeln!(w, "commit {}", commit.branch)?;
            writeln!(w, "mark :{}", commit.mark)?;
            if let Some(author) = &commit.author {
                writeln!(w, "author {author}")?;
            }
            writeln!(w, "committer {}", commit.committer)?;
            write_data(w, &commit.comment)?;
            let mut parents = commit.parents.iter();
            if let Some(first) = parents.next() {
                writeln!(w, "from :{first}")?;
            }
            for merge in parents {
                writeln!(w, "merge :{merge}")?;
            }
            for op in &commit.fileops {
                write_fileop(w, op)?;
            }
        }
        Event::Tag(tag) => {
            writeln!(w, "tag {}", tag.name)?;
            writeln!(w, "from :{}", tag.target_mark)?;
            writeln!(w, "tagger {}", tag.tagger)?;
            write_data(w, &tag.comment)?;
        }
        Event::Reset(reset) => {
            writeln!(w, "reset {}", reset.branch)?;
            if let Some(mark) = reset.target_mark {
                writeln!(w, "from :{mark}")?;
            }
        }
        Event::Passthrough(line) => {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}

/// Write an entire event list, each event earlier than anything that
/// references its mark.
pub fn write_events(w: &mut impl Write, events: &[Event]) -> Result<(), OutputError> {
    for event in events {
        write_event(w, event)?;
    }
    Ok(())
}
