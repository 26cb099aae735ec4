//! The syntax tree handed from the parser to the code generator.
//!
//! Nodes live in a single [`Arena`] and refer to each other through dense
//! 32-bit [`NodeId`] handles; child sequences are ranges into the arena's
//! side tables, so nodes stay `Copy` and the tree borrows its names straight
//! from the source text.

mod arena;

pub(crate) use arena::{Arena, NodeId, NodeList, ParamList};

/// One of the four WebAssembly [value types] the source language exposes.
///
/// The absence of a value ("void") is represented as `Option<ValType>::None`
/// wherever it can occur; it is not a value type.
///
/// [value types]: https://webassembly.github.io/spec/core/syntax/types.html#value-types
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl ValType {
    /// The canonical one-byte encoding of the type in the binary format.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::I32 => 0x7F,
            Self::I64 => 0x7E,
            Self::F32 => 0x7D,
            Self::F64 => 0x7C,
        }
    }

    /// Base-2 logarithm of the natural access width in bytes, emitted as the
    /// alignment hint of load and store instructions.
    pub(crate) fn alignment(self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 2,
            Self::I64 | Self::F64 => 3,
        }
    }

    /// Maps a reserved type identifier to its value type.
    pub(crate) fn from_symbol(name: &str) -> Option<Self> {
        Some(match name {
            "i32" => Self::I32,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return None,
        })
    }
}

/// A binary operator head of the surface syntax.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinOp {
    pub(crate) fn from_symbol(name: &str) -> Option<Self> {
        Some(match name {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "shl" => Self::Shl,
            "shr" => Self::Shr,
            _ => return None,
        })
    }

    /// Comparisons produce `i32` regardless of their operand type.
    pub(crate) fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Gt | Self::Le | Self::Ge
        )
    }
}

/// A parameter declaration: a name bound to a value type.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Param<'src> {
    pub(crate) name: &'src str,
    pub(crate) ty: ValType,
}

/// A single node of the syntax tree.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Node<'src> {
    /// An integer literal. Typed `i32` by the expression typer; the parser
    /// accepts the full signed 64-bit range.
    Int(i64),
    /// A float literal, typed `f64`.
    Float(f64),
    /// A reference to a parameter or local.
    Ident(&'src str),
    Binary {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Call {
        callee: &'src str,
        args: NodeList,
    },
    If {
        condition: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    },
    /// A sequence of expressions; the value of the block is the value of its
    /// last child.
    Block(NodeList),
    /// `(var name type init)`, introducing a local with flat per-function
    /// scope.
    Local {
        name: &'src str,
        ty: ValType,
        init: NodeId,
    },
    /// `(set name value)`.
    Assign {
        name: &'src str,
        value: NodeId,
    },
    While {
        condition: NodeId,
        body: NodeList,
    },
    /// `(load type addr)`, reading from linear memory.
    Load {
        ty: ValType,
        addr: NodeId,
    },
    /// `(store type addr value)`, writing to linear memory.
    Store {
        ty: ValType,
        addr: NodeId,
        value: NodeId,
    },
    Func {
        name: &'src str,
        params: ParamList,
        result: Option<ValType>,
        body: NodeList,
    },
    Export(&'src str),
    Import {
        module: &'src str,
        field: &'src str,
        params: ParamList,
        result: Option<ValType>,
    },
}
