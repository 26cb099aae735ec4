//! The compiler's failure taxonomy.

/// Result type used throughout the compiler.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kinds of failure a compilation can end in.
///
/// Errors are coarse: a kind is reported without source locations, and the
/// first failure aborts the compilation with any partial output discarded.
/// The [`name()`] of a kind is the stable spelling used on the command line
/// and by the hosted entrypoint's error channel.
///
/// [`name()`]: Error::name
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The source text is not a well-formed program: unbalanced parentheses,
    /// a malformed literal, a reserved word used as a name, or a form with
    /// the wrong shape.
    #[error("malformed source text")]
    Syntax,
    /// An identifier references no parameter or local in the enclosing
    /// function.
    #[error("identifier does not name a parameter or local in scope")]
    UndefinedVariable,
    /// A call or an export directive names no import or function definition.
    #[error("call or export does not name a known function")]
    UndefinedFunction,
    /// Two functions share a name, or a parameter or local is declared
    /// twice within one function.
    #[error("two definitions share a name")]
    DuplicateDefinition,
    /// Operand types disagree, an `if` produces differing branch types, a
    /// condition is not `i32`, or a declaration and its value disagree.
    #[error("operand or declaration types disagree")]
    TypeMismatch,
    /// The operator has no mapping for the operand type, such as a bitwise
    /// operator applied to floating-point operands.
    #[error("operator is not defined for the operand type")]
    UnsupportedOperator,
    /// An integer literal exceeds the range of its type, or a dense index
    /// exceeds 32 bits.
    #[error("value exceeds its representable range")]
    Overflow,
    /// Allocation failed while growing the output buffer.
    #[error("allocation failed")]
    OutOfMemory,
}

impl Error {
    /// The canonical name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Syntax => "Syntax",
            Self::UndefinedVariable => "UndefinedVariable",
            Self::UndefinedFunction => "UndefinedFunction",
            Self::DuplicateDefinition => "DuplicateDefinition",
            Self::TypeMismatch => "TypeMismatch",
            Self::UnsupportedOperator => "UnsupportedOperator",
            Self::Overflow => "Overflow",
            Self::OutOfMemory => "OutOfMemory",
        }
    }
}
