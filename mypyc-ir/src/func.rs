use std::fmt;

use mypyc_types::RType;

use crate::{BasicBlock, BlockId, ExceptionTable, HandlerRegion, Register, RegisterId};

/// A reference to a function by its fully-qualified name
/// (`"module.name"`), resolved to an actual [`FuncIr`] through the
/// compilation-unit declaration table (§4.9) rather than held directly,
/// so that `Call` ops don't create a cycle between `ModuleIr`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuncRef(String);

impl FuncRef {
    /// Build a reference from a fully-qualified name.
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self(qualified_name.into())
    }

    /// The fully-qualified name.
    pub fn qualified_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A function's declared argument and return types (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    arg_types: Vec<RType>,
    return_type: RType,
}

impl Signature {
    /// Build a signature from its argument types (in declaration order)
    /// and return type.
    pub fn new(arg_types: Vec<RType>, return_type: RType) -> Self {
        Self {
            arg_types,
            return_type,
        }
    }

    /// The argument types, in declaration order.
    pub fn arg_types(&self) -> &[RType] {
        &self.arg_types
    }

    /// The declared return type.
    pub fn return_type(&self) -> &RType {
        &self.return_type
    }
}

/// Boolean flags describing a function's special calling shapes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuncFlags {
    /// Lowered from a `def` containing `yield`; its body is a state
    /// machine rather than straight-line control flow (§4.4).
    pub is_generator: bool,
    /// Decorated `@property`; emitted with a getter/setter slot instead
    /// of an ordinary method entry.
    pub is_property: bool,
    /// Decorated `@staticmethod`; has no implicit `self`/`cls` argument.
    pub is_static: bool,
    /// Decorated `@classmethod`.
    pub is_class_method: bool,
    /// A non-native fallback stub (§4.9, §8 scenario 6) that constructs
    /// the regular Python equivalent at module-init time instead of a
    /// native function body.
    pub is_non_native: bool,
}

/// A compiled function: its signature, argument registers, and body
/// (§3). Owns every [`Register`] and [`BasicBlock`] it contains; both
/// are addressed by small arena indices rather than pointers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FuncIr {
    name: String,
    signature: Signature,
    registers: Vec<Register>,
    arg_registers: Vec<RegisterId>,
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    flags: FuncFlags,
    exception_table: ExceptionTable,
}

impl FuncIr {
    /// Construct a new function with one empty entry block and registers
    /// pre-allocated for `arg_types` (named positionally `a0`, `a1`, ...;
    /// the builder renames them from the typed AST's parameter names).
    pub fn new(name: impl Into<String>, signature: Signature, arg_names: Vec<String>, flags: FuncFlags) -> Self {
        let mut registers = Vec::new();
        let mut arg_registers = Vec::new();
        for (i, ty) in signature.arg_types().iter().enumerate() {
            let id = RegisterId::from_raw(i as u32);
            let name = arg_names.get(i).cloned().unwrap_or_else(|| format!("a{i}"));
            registers.push(Register::new(id, ty.clone(), name, true));
            arg_registers.push(id);
        }
        let entry = BlockId::from_raw(0);
        let blocks = vec![BasicBlock::new(entry)];
        Self {
            name: name.into(),
            signature,
            registers,
            arg_registers,
            blocks,
            entry,
            flags,
            exception_table: ExceptionTable::new(),
        }
    }

    /// The function's (unqualified) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's declared signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The function's flag set.
    pub fn flags(&self) -> FuncFlags {
        self.flags
    }

    /// Mutable access to the flag set, for the builder to set
    /// `is_generator`/`is_property`/etc. once it knows them.
    pub fn flags_mut(&mut self) -> &mut FuncFlags {
        &mut self.flags
    }

    /// Allocate a fresh register of type `ty`. Used by the builder for
    /// every expression's result and by passes inserting temporaries
    /// (e.g. a `bool` flag register for a paired-flag op).
    pub fn new_register(&mut self, ty: RType, name: impl Into<String>) -> RegisterId {
        let id = RegisterId::from_raw(self.registers.len() as u32);
        self.registers.push(Register::new(id, ty, name, false));
        id
    }

    /// Look up a register by id.
    pub fn register(&self, id: RegisterId) -> &Register {
        &self.registers[id.raw() as usize]
    }

    /// All registers, in allocation order (arguments first).
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// The function's argument registers, in declaration order.
    pub fn arg_registers(&self) -> &[RegisterId] {
        &self.arg_registers
    }

    /// Allocate a fresh empty, unterminated block.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// The function's entry block.
    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    /// Look up a block by id.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.raw() as usize]
    }

    /// Mutable access to a block by id, used by every pass to append ops
    /// and rewrite terminators.
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.raw() as usize]
    }

    /// All blocks, in allocation order (not necessarily reverse
    /// postorder — use [`crate::Cfg::reverse_postorder`] for that).
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Mutable access to every block, used by passes that need to touch
    /// the whole function (e.g. computing liveness before rewriting).
    pub fn blocks_mut(&mut self) -> &mut Vec<BasicBlock> {
        &mut self.blocks
    }

    /// The `try`-statement guarded spans recorded by the body pass
    /// (§4.4, §4.6), consulted by the exception pass.
    pub fn exception_table(&self) -> &ExceptionTable {
        &self.exception_table
    }

    /// Record a guarded span found while building this function's body.
    pub fn push_handler_region(&mut self, region: HandlerRegion) {
        self.exception_table.push_region(region);
    }
}
