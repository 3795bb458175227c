//! IO handling for the ANNA simulator.
//!
//! Input is a queue of words loaded before the program runs (see [`parse_inputs`]).
//! Output is sent to an [`OutputSink`] once per `out`, `outs`, or `outn` instruction.
//!
//! This module includes these sinks:
//! - [`NullOutput`]: An `OutputSink` that discards all output.
//! - [`BufferedOutput`]: An `OutputSink` that collects output into a shared buffer.
//! - [`ChannelOutput`]: An `OutputSink` that sends output through a channel (e.g., to a UI thread).
//! - [`FnOutput`]: An `OutputSink` that can be used to wrap around custom output handling.

use std::sync::{Arc, RwLock};

use crossbeam_channel as cbc;

use super::mem::Word;
use crate::ast::{Operand, OperandErr};

/// A value printed by the program.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Output {
    /// A number printed by `out`.
    Number(i16),
    /// A number printed by `outn`, which is followed by a newline.
    Line(i16),
    /// A string printed by `outs`.
    Str(String),
}
impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Number(n) => write!(f, "{n}"),
            Output::Line(n)   => writeln!(f, "{n}"),
            Output::Str(s)    => f.write_str(s),
        }
    }
}

/// A destination for the program's output.
pub trait OutputSink {
    /// Sends an output value.
    ///
    /// This returns whether the output could be delivered.
    fn emit(&mut self, output: Output) -> bool;
}
impl dyn OutputSink {} // assert OutputSink is dyn safe

/// No output. All output is discarded (and considered delivered).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;
impl OutputSink for NullOutput {
    fn emit(&mut self, _output: Output) -> bool {
        true
    }
}

/// Output that is written to a shared buffer.
///
/// The buffer can be accessed in code via [`BufferedOutput::get_output`].
/// Cloning this sink shares the buffer.
///
/// ```
/// use anna_ensemble::sim::io::{BufferedOutput, Output, OutputSink};
///
/// let out = BufferedOutput::new();
/// let mut sink = out.clone();
/// sink.emit(Output::Number(3));
/// assert_eq!(out.take(), [Output::Number(3)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    output: Arc<RwLock<Vec<Output>>>
}
impl BufferedOutput {
    /// Creates a new BufferedOutput.
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates a new BufferedOutput from an already defined buffer.
    pub fn with_buf(output: Arc<RwLock<Vec<Output>>>) -> Self {
        Self { output }
    }
    /// Gets a reference to the output buffer.
    pub fn get_output(&self) -> &Arc<RwLock<Vec<Output>>> {
        &self.output
    }
    /// Takes all of the output out of the buffer.
    pub fn take(&self) -> Vec<Output> {
        match self.output.write() {
            Ok(mut g) => std::mem::take(&mut *g),
            Err(e) => std::mem::take(&mut *e.into_inner()),
        }
    }
}
impl OutputSink for BufferedOutput {
    fn emit(&mut self, output: Output) -> bool {
        match self.output.write() {
            Ok(mut g) => g.push(output),
            Err(e) => e.into_inner().push(output),
        }
        true
    }
}

/// Output that is sent through a channel.
///
/// This lets another thread (such as a debugger UI) display output as the program runs.
/// Output is undeliverable once the receiver is dropped.
///
/// ```
/// use anna_ensemble::sim::io::{ChannelOutput, Output, OutputSink};
///
/// let (mut sink, rx) = ChannelOutput::channel();
/// let printer = std::thread::spawn(move || rx.iter().map(|o| o.to_string()).collect::<String>());
///
/// sink.emit(Output::Str("n = ".to_string()));
/// sink.emit(Output::Line(5));
/// drop(sink);
/// assert_eq!(printer.join().unwrap(), "n = 5\n");
/// ```
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    tx: cbc::Sender<Output>
}
impl ChannelOutput {
    /// Creates a new channel output, and the receiver of its output.
    pub fn channel() -> (Self, cbc::Receiver<Output>) {
        let (tx, rx) = cbc::unbounded();
        (Self { tx }, rx)
    }
    /// Creates a channel output from an existing sender.
    pub fn with_sender(tx: cbc::Sender<Output>) -> Self {
        Self { tx }
    }
}
impl OutputSink for ChannelOutput {
    fn emit(&mut self, output: Output) -> bool {
        self.tx.send(output).is_ok()
    }
}

/// Output that is handled by a custom function.
///
/// ```
/// use anna_ensemble::sim::io::{FnOutput, Output, OutputSink};
///
/// let mut count = 0;
/// let mut sink = FnOutput(|_: Output| { count += 1; true });
/// sink.emit(Output::Number(1));
/// sink.emit(Output::Number(2));
/// drop(sink);
/// assert_eq!(count, 2);
/// ```
pub struct FnOutput<F>(pub F);
impl<F: FnMut(Output) -> bool> OutputSink for FnOutput<F> {
    fn emit(&mut self, output: Output) -> bool {
        (self.0)(output)
    }
}
impl<F> std::fmt::Debug for FnOutput<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOutput").finish_non_exhaustive()
    }
}

/// Parses input tokens into words for the input queue.
///
/// Each token is a decimal, hex (`0x`), or binary (`0b`) number, optionally negated.
/// Values from -32768 to 65535 are accepted (as the signed or unsigned view of a word).
///
/// ```
/// use anna_ensemble::sim::io::parse_inputs;
///
/// let words = parse_inputs(["10", "-1", "0x20"]).unwrap();
/// let values: Vec<_> = words.iter().map(|w| w.as_signed()).collect();
/// assert_eq!(values, [10, -1, 32]);
///
/// assert!(parse_inputs(["r1"]).is_err());
/// ```
pub fn parse_inputs<S: AsRef<str>>(tokens: impl IntoIterator<Item = S>) -> Result<Vec<Word>, OperandErr> {
    tokens.into_iter()
        .map(|t| {
            let value = Operand::parse(t.as_ref())?.as_int()?;
            // as_int is within [-32768, 65535], so this wraps to the word's two views
            Ok(Word::new(value as u16))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_inputs, BufferedOutput, ChannelOutput, NullOutput, Output, OutputSink};
    use crate::ast::OperandErr;

    #[test]
    fn test_output_display() {
        let outs = [Output::Str("fib: ".into()), Output::Number(-5), Output::Line(8), Output::Line(13)];
        let text: String = outs.iter().map(ToString::to_string).collect();
        assert_eq!(text, "fib: -58\n13\n");
    }

    #[test]
    fn test_sinks() {
        let buf = BufferedOutput::new();
        let mut sink: Box<dyn OutputSink + Send> = Box::new(buf.clone());
        assert!(sink.emit(Output::Number(1)));
        assert!(sink.emit(Output::Line(2)));
        assert_eq!(buf.get_output().read().unwrap().len(), 2);
        assert_eq!(buf.take(), [Output::Number(1), Output::Line(2)]);
        assert!(buf.take().is_empty());

        assert!(NullOutput.emit(Output::Number(0)));

        let (mut tx, rx) = ChannelOutput::channel();
        assert!(tx.emit(Output::Number(4)));
        assert_eq!(rx.try_recv(), Ok(Output::Number(4)));
        drop(rx);
        assert!(!tx.emit(Output::Number(5)));
    }

    #[test]
    fn test_parse_inputs() {
        let words = parse_inputs(["0", "65535", "-32768", "0b101", "0xFFFF"]).unwrap();
        let values: Vec<_> = words.iter().map(|w| w.as_unsigned()).collect();
        assert_eq!(values, [0, 0xFFFF, 0x8000, 5, 0xFFFF]);

        assert!(matches!(parse_inputs(["65536"]), Err(OperandErr::Lex { .. })));
        assert!(matches!(parse_inputs(["&x"]), Err(OperandErr::TypeMismatch { .. })));
        assert!(parse_inputs(Vec::<String>::new()).unwrap().is_empty());
    }
}
