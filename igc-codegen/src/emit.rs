//! Emission sink
//! 
//! Every generator writes its instruction text through an [`Emitter`]. The
//! emitter keeps a stack of line buffers: the root buffer holds the output of
//! the whole generation pass, and [`Emitter::capture`] pushes a fresh buffer
//! for the duration of a closure. A generator uses it to hand a finished
//! sequence of lines back to its caller instead of writing them straight
//! into the pass output.

use igc_common::CodegenError;
use log::trace;

const INDENT: &str = "    ";

/// Ordered text-line accumulator with nested capture scopes
#[derive(Debug)]
pub struct Emitter {
    /// Line buffers, root first. Never empty.
    stack: Vec<Vec<String>>,
    
    /// Current indentation depth
    indent: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            stack: vec![Vec::new()],
            indent: 0,
        }
    }
    
    /// Append one line to the innermost buffer
    pub fn emit(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        let text = if line.is_empty() || self.indent == 0 {
            line.to_string()
        } else {
            format!("{}{}", INDENT.repeat(self.indent), line)
        };
        if let Some(buffer) = self.stack.last_mut() {
            buffer.push(text);
        }
    }
    
    /// Append several lines in order
    pub fn emit_all<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.emit(line);
        }
    }
    
    /// Run `f` against a fresh buffer and return what it emitted
    /// 
    /// The buffer is popped and the previous indentation restored on every
    /// exit from `f`, including an unwinding panic, so an error inside a
    /// nested capture never leaks lines into the enclosing buffer.
    pub fn capture<F, E>(&mut self, f: F) -> Result<Vec<String>, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        let scope = CaptureScope::open(self);
        let result = f(&mut *scope.emitter);
        let captured = scope.close();
        trace!("capture: closed with {} lines", captured.len());
        result.map(|()| captured)
    }
    
    /// Emit an assembler macro definition
    /// 
    /// The body is captured first, so a failing body leaves no half-written
    /// `.macro` header behind.
    pub fn emit_macro<F, E>(&mut self, header: &str, body: F) -> Result<(), E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
    {
        let lines = self.capture(body)?;
        self.emit(format!(".macro {}", header));
        self.indent += 1;
        self.emit_all(lines);
        self.indent -= 1;
        self.emit(".endm");
        self.emit("");
        Ok(())
    }
    
    /// Number of capture scopes currently open
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
    
    /// Lines in the root buffer
    pub fn lines(&self) -> &[String] {
        &self.stack[0]
    }
    
    /// Root buffer as newline-terminated text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// One open capture buffer; dropping it without `close` discards the buffer
struct CaptureScope<'a> {
    emitter: &'a mut Emitter,
    saved_indent: usize,
    open: bool,
}

impl<'a> CaptureScope<'a> {
    fn open(emitter: &'a mut Emitter) -> Self {
        emitter.stack.push(Vec::new());
        let saved_indent = std::mem::replace(&mut emitter.indent, 0);
        trace!("capture: open depth {}", emitter.depth());
        Self {
            emitter,
            saved_indent,
            open: true,
        }
    }

    fn close(mut self) -> Vec<String> {
        self.open = false;
        self.emitter.indent = self.saved_indent;
        self.emitter.stack.pop().unwrap_or_default()
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.emitter.indent = self.saved_indent;
            self.emitter.stack.pop();
        }
    }
}

/// A reusable piece of generated code with a known issue cost
/// 
/// Implementors that only make sense through a selection entry point
/// reject [`AsmMacro::emit`] with [`CodegenError::Misuse`].
pub trait AsmMacro {
    /// Name the generated code is referenced by, empty for inlined code
    fn name(&self) -> String;
    
    /// Emit the generated code into `emitter`
    fn emit(&self, emitter: &mut Emitter) -> Result<(), CodegenError>;
    
    /// Number of instruction issues one use of this code costs
    fn issues(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_emit_to_root() {
        let mut e = Emitter::new();
        e.emit("s_nop 0");
        e.emit_all(["s_endpgm"]);
        assert_eq!(e.lines(), &["s_nop 0".to_string(), "s_endpgm".to_string()]);
        assert_eq!(e.render(), "s_nop 0\ns_endpgm\n");
    }

    #[test]
    fn test_nested_capture() {
        let mut e = Emitter::new();
        e.emit("before");
        let outer = e
            .capture(|e| {
                e.emit("outer 0");
                let inner = e.capture(|e| {
                    e.emit("inner");
                    Ok::<(), CodegenError>(())
                })?;
                assert_eq!(inner, vec!["inner".to_string()]);
                assert_eq!(e.depth(), 1);
                e.emit("outer 1");
                Ok::<(), CodegenError>(())
            })
            .unwrap();
        assert_eq!(outer, vec!["outer 0".to_string(), "outer 1".to_string()]);
        assert_eq!(e.lines(), &["before".to_string()]);
        assert_eq!(e.depth(), 0);
    }

    #[test]
    fn test_capture_restores_on_error() {
        let mut e = Emitter::new();
        e.emit("kept");
        let result = e.capture(|e| {
            e.emit("discarded");
            e.capture(|e| {
                e.emit("also discarded");
                Err(CodegenError::UnsupportedWidth(6))
            })?;
            Ok(())
        });
        assert_eq!(result, Err(CodegenError::UnsupportedWidth(6)));
        assert_eq!(e.depth(), 0);
        e.emit("after");
        assert_eq!(e.lines(), &["kept".to_string(), "after".to_string()]);
    }

    #[test]
    fn test_emit_macro() {
        let mut e = Emitter::new();
        e.emit_macro("m_demo v_a", |e| {
            e.emit("v_mov_b32 v[\\v_a], 0");
            Ok::<(), CodegenError>(())
        })
        .unwrap();
        assert_eq!(
            e.render(),
            ".macro m_demo v_a\n    v_mov_b32 v[\\v_a], 0\n.endm\n\n"
        );
    }

    #[test]
    fn test_capture_restores_on_panic() {
        let mut e = Emitter::new();
        e.emit("kept");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = e.capture(|e| -> Result<(), CodegenError> {
                e.emit("lost");
                panic!("generator bug")
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(e.depth(), 0);
        e.emit("after");
        assert_eq!(e.lines(), &["kept", "after"]);
    }

    #[test]
    fn test_failed_macro_leaves_nothing() {
        let mut e = Emitter::new();
        let result = e.emit_macro("m_broken", |e| {
            e.emit("s_nop 0");
            Err(CodegenError::internal("broken body"))
        });
        assert!(result.is_err());
        assert!(e.lines().is_empty());
    }
}
