use std::collections::HashMap;

use mypyc_ir::{
    BlockId, CallArgs, CanRaise, ErrorKind, FuncIr, HandlerRegion, LiteralValue, OpKind,
    RegisterId, SourceSpan, Terminator,
};
use mypyc_registry::{BinarySymbol, CompareSymbol, LoweringRule, OpShape, Registry, UnarySymbol};
use mypyc_types::{RTuple, RType};

use crate::ast::{ExceptHandler, TypedExpr, TypedFunctionDef, TypedStmt};
use crate::declare::{new_func_skeleton, ModuleDecl};
use crate::error::BuildError;

struct LoopContext {
    break_target: BlockId,
    continue_target: BlockId,
}

/// Lowers one function body to a `FuncIr` (§4.4's "body pass"). Owns the
/// function under construction and the bookkeeping — current block,
/// local-name bindings, loop and exception-handler context stacks — the
/// builder needs while walking statements.
struct FunctionBuilder<'a> {
    func: FuncIr,
    module_name: &'a str,
    decl: &'a ModuleDecl,
    registry: &'a Registry,
    cur: BlockId,
    locals: HashMap<String, RegisterId>,
    loops: Vec<LoopContext>,
}

/// Lower `func_def` to IR given the enclosing module's declaration table
/// and the shared primitive registry (§4.4).
#[tracing::instrument(skip(func_def, decl, registry), fields(func = %func_def.name))]
pub fn build_function(
    func_def: &TypedFunctionDef,
    module_name: &str,
    decl: &ModuleDecl,
    registry: &Registry,
) -> Result<FuncIr, BuildError> {
    let qualified = format!("{module_name}.{}", func_def.name);
    let sig = decl
        .funcs
        .get(&qualified)
        .cloned()
        .ok_or_else(|| BuildError::Internal {
            detail: format!("no declared signature for {qualified}"),
        })?;
    let arg_names = func_def.params.iter().map(|p| p.name.clone()).collect();
    let func = new_func_skeleton(&func_def.name, &sig, arg_names, func_def.is_generator);

    let mut builder = FunctionBuilder {
        cur: func.entry_block(),
        locals: func_def
            .params
            .iter()
            .zip(func.arg_registers())
            .map(|(p, r)| (p.name.clone(), *r))
            .collect(),
        func,
        module_name,
        decl,
        registry,
        loops: Vec::new(),
    };
    builder.predeclare_locals(&func_def.body);

    builder.build_block(&func_def.body)?;
    builder.finish(&sig.return_type().clone())?;
    Ok(builder.func)
}

impl<'a> FunctionBuilder<'a> {
    fn finish(&mut self, return_type: &RType) -> Result<(), BuildError> {
        if self.func.block(self.cur).terminator().is_none() {
            if matches!(return_type, RType::RVoid) {
                self.func.block_mut(self.cur).set_terminator(Terminator::Return(None));
            } else {
                let sentinel = self.emit(
                    return_type.clone(),
                    "implicit_return",
                    OpKind::ErrorValue {
                        ty: return_type.clone(),
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    &SourceSpan::synthetic(),
                );
                self.func
                    .block_mut(self.cur)
                    .set_terminator(Terminator::Return(Some(sentinel)));
            }
        }
        Ok(())
    }

    fn push_op(
        &mut self,
        dest: Option<RegisterId>,
        kind: OpKind,
        can_raise: CanRaise,
        error_kind: ErrorKind,
        span: &SourceSpan,
    ) {
        let op = mypyc_ir::Op::new(dest, kind, can_raise, error_kind, span.clone());
        self.func.block_mut(self.cur).push_op(op);
    }

    fn emit(
        &mut self,
        ty: RType,
        name: &str,
        kind: OpKind,
        can_raise: CanRaise,
        error_kind: ErrorKind,
        span: &SourceSpan,
    ) -> RegisterId {
        let dest = self.func.new_register(ty, name);
        self.push_op(Some(dest), kind, can_raise, error_kind, span);
        dest
    }

    fn fail_kind(&mut self, can_raise: bool, ty: &RType) -> (CanRaise, ErrorKind) {
        if !can_raise {
            return (CanRaise::Never, ErrorKind::None);
        }
        if ty.error_overlap() {
            let flag = self.func.new_register(RType::bool(), "err_flag");
            (CanRaise::May, ErrorKind::PairedFlag { flag })
        } else {
            (CanRaise::May, ErrorKind::Sentinel)
        }
    }

    fn new_block(&mut self) -> BlockId {
        self.func.new_block()
    }

    // -- statements --

    fn build_block(&mut self, stmts: &[TypedStmt]) -> Result<(), BuildError> {
        for stmt in stmts {
            if self.func.block(self.cur).terminator().is_some() {
                // Dead code after an unconditional exit (return/break/
                // continue/raise); nothing downstream of it is reachable.
                break;
            }
            self.build_stmt(stmt)?;
        }
        Ok(())
    }

    fn build_stmt(&mut self, stmt: &TypedStmt) -> Result<(), BuildError> {
        match stmt {
            TypedStmt::Pass(_) => Ok(()),
            TypedStmt::ExprStmt(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            TypedStmt::Assign { target, value, span, .. } => {
                let value_reg = self.lower_expr(value)?;
                self.assign_local(target, value_reg, span);
                Ok(())
            }
            TypedStmt::AugAssign {
                target, op, value, ..
            } => {
                let span = value.span().clone();
                let Some(&cur_reg) = self.locals.get(target) else {
                    return Err(BuildError::UnsupportedConstruct {
                        what: format!("augmented assignment to undeclared name {target}"),
                        span,
                    });
                };
                let cur_ty = self.func.register(cur_reg).ty().clone();
                let rhs_reg = self.lower_expr(value)?;
                let rhs_ty = value.ty();
                let result =
                    self.lower_binary(*op, cur_reg, &cur_ty, rhs_reg, &rhs_ty, &span)?;
                self.assign_local(target, result, &span);
                Ok(())
            }
            TypedStmt::If {
                test,
                body,
                orelse,
                ..
            } => self.build_if(test, body, orelse),
            TypedStmt::While { test, body, .. } => self.build_while(test, body),
            TypedStmt::For {
                target,
                iter,
                body,
                ..
            } => self.build_for(target, iter, body),
            TypedStmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => self.build_try(body, handlers, orelse, finalbody),
            TypedStmt::With {
                context,
                target,
                body,
                span,
            } => self.build_with(context, target.as_deref(), body, span),
            TypedStmt::Return(value, span) => {
                let reg = match value {
                    Some(e) => Some(self.lower_expr(e)?),
                    None => None,
                };
                self.func.block_mut(self.cur).set_terminator(Terminator::Return(reg));
                let _ = span;
                Ok(())
            }
            TypedStmt::Raise(exc, span) => {
                match exc {
                    Some(e) => {
                        let _ = self.lower_expr(e)?;
                    }
                    None => {
                        self.push_op(
                            None,
                            OpKind::CallC {
                                c_function: "CPyErr_Reraise".into(),
                                args: CallArgs::positional(vec![]),
                            },
                            CanRaise::Must,
                            ErrorKind::AlwaysChecked,
                            span,
                        );
                    }
                }
                self.raise_edge(span);
                Ok(())
            }
            TypedStmt::Break(span) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.break_target)
                    .ok_or_else(|| BuildError::UnsupportedConstruct {
                        what: "break outside a loop".into(),
                        span: span.clone(),
                    })?;
                self.func.block_mut(self.cur).set_terminator(Terminator::Goto(target));
                Ok(())
            }
            TypedStmt::Continue(span) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.continue_target)
                    .ok_or_else(|| BuildError::UnsupportedConstruct {
                        what: "continue outside a loop".into(),
                        span: span.clone(),
                    })?;
                self.func.block_mut(self.cur).set_terminator(Terminator::Goto(target));
                Ok(())
            }
            TypedStmt::FunctionDef(_) => Err(BuildError::UnsupportedConstruct {
                what: "nested function definitions are compiled as module-level closures \
                       by a separate pre-pass, not inline by the body builder"
                    .into(),
                span: SourceSpan::synthetic(),
            }),
            TypedStmt::ClassDef(_) => Err(BuildError::UnsupportedConstruct {
                what: "nested class definitions are not supported".into(),
                span: SourceSpan::synthetic(),
            }),
        }
    }

    /// Pre-allocates one stable register per source-level local assigned
    /// anywhere in `stmts` (§4.5): every local is declared once, up
    /// front, so that a read reached along a path that never assigned
    /// it is a meaningful "uninitialized register" rather than a
    /// builder error. Arguments are excluded (already registers).
    fn predeclare_locals(&mut self, stmts: &[TypedStmt]) {
        let mut found: Vec<(String, RType)> = Vec::new();
        collect_assigned_locals(stmts, &mut found);
        for (name, ty) in found {
            if self.locals.contains_key(&name) {
                continue;
            }
            let reg = self.func.new_register(ty, &name);
            self.locals.insert(name, reg);
        }
    }

    /// Writes `value` into `name`'s register, which `predeclare_locals`
    /// guarantees already exists: either the function's first write to
    /// it (an `Assign` into the pre-allocated, still-unwritten slot) or
    /// a later overwrite. Either way the destination register never
    /// changes, so a register's uninit status is exactly "has any
    /// assignment to it executed on this path yet".
    fn assign_local(&mut self, name: &str, value: RegisterId, span: &SourceSpan) {
        let dest = *self
            .locals
            .get(name)
            .unwrap_or_else(|| panic!("{name} read before predeclare_locals ran"));
        self.push_op(
            Some(dest),
            OpKind::Assign { src: value },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
    }

    fn bind(&mut self, name: &str, reg: RegisterId) {
        self.locals.insert(name.to_string(), reg);
    }

    /// Marks the CFG edge a raising construct takes: to the innermost
    /// active handler if one is registered for the current block, or
    /// left to the exception pass's default (function epilogue) when
    /// none is. The builder itself does not rewrite the edge — the
    /// exception pass (§4.6) reads `exception_table()` afterward and
    /// performs the actual block split/branch insertion.
    fn raise_edge(&mut self, _span: &SourceSpan) {
        // Deliberately a no-op here: the op just pushed already carries
        // its own `can_raise`/`error_kind`, and the handler region (if
        // any) covering `self.cur` is already recorded in the function's
        // exception table. The exception pass is the single place that
        // turns that information into actual CFG edges.
    }

    fn build_if(
        &mut self,
        test: &TypedExpr,
        body: &[TypedStmt],
        orelse: &[TypedStmt],
    ) -> Result<(), BuildError> {
        let cond = self.lower_expr(test)?;
        let then_b = self.new_block();
        let else_b = self.new_block();
        let join_b = self.new_block();

        self.func.block_mut(self.cur).set_terminator(Terminator::Branch {
            cond,
            then_target: then_b,
            else_target: else_b,
            negate: false,
        });

        self.cur = then_b;
        self.build_block(body)?;
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));
        }

        self.cur = else_b;
        self.build_block(orelse)?;
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));
        }

        self.cur = join_b;
        Ok(())
    }

    fn build_while(&mut self, test: &TypedExpr, body: &[TypedStmt]) -> Result<(), BuildError> {
        let header = self.new_block();
        let body_b = self.new_block();
        let join_b = self.new_block();

        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(header));

        self.cur = header;
        let cond = self.lower_expr(test)?;
        self.func.block_mut(self.cur).set_terminator(Terminator::Branch {
            cond,
            then_target: body_b,
            else_target: join_b,
            negate: false,
        });

        self.loops.push(LoopContext {
            break_target: join_b,
            continue_target: header,
        });
        self.cur = body_b;
        self.build_block(body)?;
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(header));
        }
        self.loops.pop();

        self.cur = join_b;
        Ok(())
    }

    /// Lowers `for target in iter: body` through the iterator protocol:
    /// a `CallC` to acquire an iterator, then a header block that calls
    /// `next()` and branches on `StopIteration` (§4.4).
    fn build_for(
        &mut self,
        target: &str,
        iter: &TypedExpr,
        body: &[TypedStmt],
    ) -> Result<(), BuildError> {
        let span = iter.span().clone();
        let iter_val = self.lower_expr(iter)?;
        let iterator = self.emit(
            RType::object(),
            "iter",
            OpKind::CallC {
                c_function: "CPyIter_GetIter".into(),
                args: CallArgs::positional(vec![iter_val]),
            },
            CanRaise::Never,
            ErrorKind::None,
            &span,
        );

        let header = self.new_block();
        let body_b = self.new_block();
        let join_b = self.new_block();

        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(header));

        self.cur = header;
        let item_ty = RType::object();
        let (can_raise, error_kind) = self.fail_kind(true, &item_ty);
        let item = self.emit(
            item_ty,
            target,
            OpKind::CallC {
                c_function: "CPyIter_Next".into(),
                args: CallArgs::positional(vec![iterator]),
            },
            can_raise,
            error_kind,
            &span,
        );
        let has_next = self.emit(
            RType::bool(),
            "has_next",
            OpKind::IsAssigned { local: item },
            CanRaise::Never,
            ErrorKind::None,
            &span,
        );
        self.func.block_mut(self.cur).set_terminator(Terminator::Branch {
            cond: has_next,
            then_target: body_b,
            else_target: join_b,
            negate: false,
        });

        self.loops.push(LoopContext {
            break_target: join_b,
            continue_target: header,
        });
        self.cur = body_b;
        self.bind(target, item);
        self.build_block(body)?;
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(header));
        }
        self.loops.pop();

        self.cur = join_b;
        Ok(())
    }

    fn build_try(
        &mut self,
        body: &[TypedStmt],
        handlers: &[ExceptHandler],
        orelse: &[TypedStmt],
        finalbody: &[TypedStmt],
    ) -> Result<(), BuildError> {
        let guard_entry = self.new_block();
        let handler_entry = self.new_block();
        let join_b = self.new_block();
        let finally_entry = if finalbody.is_empty() {
            None
        } else {
            Some(self.new_block())
        };

        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(guard_entry));

        let guarded_start = self.func.blocks().len();
        self.cur = guard_entry;
        self.build_block(body)?;
        if self.func.block(self.cur).terminator().is_none() {
            self.build_block(orelse)?;
        }
        let after_body = self.cur;
        let guarded_blocks: Vec<BlockId> = (guarded_start..self.func.blocks().len())
            .map(|i| BlockId::from_raw(i as u32))
            .chain(std::iter::once(guard_entry))
            .collect();

        let exit_target = finally_entry.unwrap_or(join_b);
        if self.func.block(after_body).terminator().is_none() {
            self.func.block_mut(after_body).set_terminator(Terminator::Goto(exit_target));
        }

        self.func.push_handler_region(HandlerRegion {
            guarded_blocks,
            handler_entry,
            finally_entry,
        });

        self.cur = handler_entry;
        for handler in handlers {
            if let Some(name) = &handler.bind {
                let exc_reg = self.func.new_register(RType::object(), name);
                self.bind(name, exc_reg);
            }
            self.build_block(&handler.body)?;
        }
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(exit_target));
        }

        if let Some(finally_b) = finally_entry {
            self.cur = finally_b;
            self.build_block(finalbody)?;
            if self.func.block(self.cur).terminator().is_none() {
                self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));
            }
        }

        self.cur = join_b;
        Ok(())
    }

    /// Lowers `with ctx as target: body` as `try/finally` around the
    /// context manager's `__enter__`/`__exit__` (§4.4).
    fn build_with(
        &mut self,
        context: &TypedExpr,
        target: Option<&str>,
        body: &[TypedStmt],
        span: &SourceSpan,
    ) -> Result<(), BuildError> {
        let ctx_reg = self.lower_expr(context)?;
        let ctx_ty = context.ty();
        let enter_val = self.emit(
            RType::object(),
            "entered",
            OpKind::MethodCall {
                obj: ctx_reg,
                method_name: "__enter__".into(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::May,
            ErrorKind::Sentinel,
            span,
        );
        if let Some(name) = target {
            self.bind(name, enter_val);
        }

        let guard_entry = self.new_block();
        let finally_entry = self.new_block();
        let handler_entry = self.new_block();
        let join_b = self.new_block();

        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(guard_entry));

        let guarded_start = self.func.blocks().len();
        self.cur = guard_entry;
        self.build_block(body)?;
        let guarded_blocks: Vec<BlockId> = (guarded_start..self.func.blocks().len())
            .map(|i| BlockId::from_raw(i as u32))
            .chain(std::iter::once(guard_entry))
            .collect();
        if self.func.block(self.cur).terminator().is_none() {
            self.func.block_mut(self.cur).set_terminator(Terminator::Goto(finally_entry));
        }

        self.func.push_handler_region(HandlerRegion {
            guarded_blocks,
            handler_entry,
            finally_entry: Some(finally_entry),
        });

        self.cur = handler_entry;
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(finally_entry));

        self.cur = finally_entry;
        self.push_op(
            None,
            OpKind::MethodCall {
                obj: ctx_reg,
                method_name: "__exit__".into(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::May,
            ErrorKind::Sentinel,
            span,
        );
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));

        self.cur = join_b;
        Ok(())
    }

    // -- expressions --

    fn lower_expr(&mut self, expr: &TypedExpr) -> Result<RegisterId, BuildError> {
        match expr {
            TypedExpr::Name { name, ty, span } => self.lower_name(name, ty, span),
            TypedExpr::IntLiteral { value, span } => Ok(self.emit(
                RType::int(),
                "lit",
                OpKind::LoadLiteral {
                    value: LiteralValue::Int(*value),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            )),
            TypedExpr::BoolLiteral { value, span } => Ok(self.emit(
                RType::bool(),
                "lit",
                OpKind::LoadLiteral {
                    value: LiteralValue::Bool(*value),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            )),
            TypedExpr::FloatLiteral { value, span } => Ok(self.emit(
                RType::float(),
                "lit",
                OpKind::LoadLiteral {
                    value: LiteralValue::Float(*value),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            )),
            TypedExpr::StrLiteral { value, span } => Ok(self.emit(
                RType::object(),
                "lit",
                OpKind::LoadLiteral {
                    value: LiteralValue::Str(value.clone()),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            )),
            TypedExpr::NoneLiteral { span } => Ok(self.emit(
                RType::none(),
                "lit",
                OpKind::LoadLiteral {
                    value: LiteralValue::None,
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            )),
            TypedExpr::BinaryOp {
                op, left, right, span, ..
            } => {
                let lhs_ty = left.ty();
                let rhs_ty = right.ty();
                let lhs = self.lower_expr(left)?;
                let rhs = self.lower_expr(right)?;
                self.lower_binary(*op, lhs, &lhs_ty, rhs, &rhs_ty, span)
            }
            TypedExpr::UnaryOp { op, operand, span, .. } => {
                let operand_ty = operand.ty();
                let reg = self.lower_expr(operand)?;
                self.lower_unary(*op, reg, &operand_ty, span)
            }
            TypedExpr::Compare {
                op, left, right, span, ..
            } => {
                let lhs = self.lower_expr(left)?;
                let rhs = self.lower_expr(right)?;
                Ok(self.emit(
                    RType::bool(),
                    "cmp",
                    OpKind::ComparisonOp {
                        kind: compare_kind(*op),
                        lhs,
                        rhs,
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            TypedExpr::BoolOp { is_and, values, span } => self.lower_boolop(*is_and, values, span),
            TypedExpr::Call {
                func, args, kwargs, ty, span
            } => self.lower_call(func, args, kwargs, ty, span),
            TypedExpr::Attribute { obj, name, ty, span } => {
                let obj_reg = self.lower_expr(obj)?;
                let (can_raise, error_kind) = self.fail_kind(true, ty);
                Ok(self.emit(
                    ty.clone(),
                    name,
                    OpKind::GetAttr {
                        obj: obj_reg,
                        name: name.clone(),
                    },
                    can_raise,
                    error_kind,
                    span,
                ))
            }
            TypedExpr::MethodCall {
                obj, method, args, ty, span,
            } => {
                let obj_reg = self.lower_expr(obj)?;
                let mut arg_regs = Vec::with_capacity(args.len());
                for a in args {
                    arg_regs.push(self.lower_expr(a)?);
                }
                let (can_raise, error_kind) = self.fail_kind(true, ty);
                Ok(self.emit(
                    ty.clone(),
                    method,
                    OpKind::MethodCall {
                        obj: obj_reg,
                        method_name: method.clone(),
                        args: CallArgs::positional(arg_regs),
                    },
                    can_raise,
                    error_kind,
                    span,
                ))
            }
            TypedExpr::Conditional {
                test, body, orelse, ty, span,
            } => self.lower_conditional(test, body, orelse, ty, span),
            TypedExpr::ListDisplay { items, span } => {
                let mut regs = Vec::with_capacity(items.len());
                for item in items {
                    regs.push(self.lower_expr(item)?);
                }
                Ok(self.emit(
                    RType::object(),
                    "list",
                    OpKind::ListNew { items: regs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            TypedExpr::DictDisplay { items, span } => {
                let mut pairs = Vec::with_capacity(items.len());
                for (k, v) in items {
                    let k_reg = self.lower_expr(k)?;
                    let v_reg = self.lower_expr(v)?;
                    pairs.push((k_reg, v_reg));
                }
                Ok(self.emit(
                    RType::object(),
                    "dict",
                    OpKind::DictNew { items: pairs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            TypedExpr::SetDisplay { items, span } => {
                let mut regs = Vec::with_capacity(items.len());
                for item in items {
                    regs.push(self.lower_expr(item)?);
                }
                let list = self.emit(
                    RType::object(),
                    "set_items",
                    OpKind::ListNew { items: regs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                );
                Ok(self.emit(
                    RType::object(),
                    "set",
                    OpKind::CallC {
                        c_function: "CPySet_FromIterable".into(),
                        args: CallArgs::positional(vec![list]),
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            TypedExpr::TupleDisplay { items, span } => {
                let mut regs = Vec::with_capacity(items.len());
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(item.ty());
                    regs.push(self.lower_expr(item)?);
                }
                let ty = RTuple::new(types)
                    .map(RType::RTuple)
                    .unwrap_or_else(|_| RType::object());
                Ok(self.emit(
                    ty,
                    "tuple",
                    OpKind::TupleNew { items: regs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            TypedExpr::Yield { value, ty, span } => self.lower_yield(value.as_deref(), ty, span),
        }
    }

    fn lower_name(
        &mut self,
        name: &str,
        ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        if let Some(&reg) = self.locals.get(name) {
            return Ok(reg);
        }
        if let Some(value) = self.decl.finals.get(name) {
            return Ok(self.emit(
                ty.clone(),
                name,
                OpKind::LoadLiteral {
                    value: value.clone(),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            ));
        }
        if self.decl.globals.contains_key(name) {
            let qualified = format!("{}.{}", self.module_name, name);
            return Ok(self.emit(
                ty.clone(),
                name,
                OpKind::LoadAddress { target: qualified },
                CanRaise::Never,
                ErrorKind::None,
                span,
            ));
        }
        Err(BuildError::UnsupportedConstruct {
            what: format!("reference to undeclared name {name}"),
            span: span.clone(),
        })
    }

    fn lower_binary(
        &mut self,
        op: BinarySymbol,
        lhs: RegisterId,
        lhs_ty: &RType,
        rhs: RegisterId,
        rhs_ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        let shape = OpShape::BinaryOp(op);
        match self.registry.lookup(&shape, &[lhs_ty.clone(), rhs_ty.clone()]) {
            Some(LoweringRule::IntOp(kind)) => {
                let kind = *kind;
                let can_raise = matches!(
                    kind,
                    mypyc_ir::IntOpKind::FloorDiv | mypyc_ir::IntOpKind::Mod
                );
                let (cr, ek) = self.fail_kind(can_raise, &RType::int());
                Ok(self.emit(
                    RType::int(),
                    "intop",
                    OpKind::IntOp { kind, lhs, rhs },
                    cr,
                    ek,
                    span,
                ))
            }
            Some(LoweringRule::FloatOp(kind)) => {
                let kind = *kind;
                let can_raise = matches!(kind, mypyc_ir::FloatOpKind::Div | mypyc_ir::FloatOpKind::Mod);
                let (cr, ek) = self.fail_kind(can_raise, &RType::float());
                Ok(self.emit(
                    RType::float(),
                    "floatop",
                    OpKind::FloatOp { kind, lhs, rhs },
                    cr,
                    ek,
                    span,
                ))
            }
            Some(LoweringRule::BoolOp(kind)) => {
                let kind = *kind;
                Ok(self.emit(
                    RType::bool(),
                    "boolop",
                    OpKind::BoolOp { kind, lhs, rhs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            Some(LoweringRule::ComparisonOp(kind)) => {
                let kind = *kind;
                Ok(self.emit(
                    RType::bool(),
                    "cmp",
                    OpKind::ComparisonOp { kind, lhs, rhs },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            Some(LoweringRule::CHelper(rule)) => {
                let rule = rule.clone();
                let (cr, ek) = self.fail_kind(rule.can_raise, &rule.result);
                Ok(self.emit(
                    rule.result,
                    "chelper",
                    OpKind::CallC {
                        c_function: rule.c_function,
                        args: CallArgs::positional(vec![lhs, rhs]),
                    },
                    cr,
                    ek,
                    span,
                ))
            }
            None => {
                let result = RType::object();
                let (cr, ek) = self.fail_kind(true, &result);
                Ok(self.emit(
                    result,
                    "binop_generic",
                    OpKind::CallC {
                        c_function: generic_binop_helper(op).into(),
                        args: CallArgs::positional(vec![lhs, rhs]),
                    },
                    cr,
                    ek,
                    span,
                ))
            }
        }
    }

    fn lower_unary(
        &mut self,
        op: UnarySymbol,
        operand: RegisterId,
        operand_ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        let shape = OpShape::UnaryOp(op);
        match self.registry.lookup(&shape, std::slice::from_ref(operand_ty)) {
            Some(LoweringRule::IntOp(kind)) => {
                let kind = *kind;
                Ok(self.emit(
                    RType::int(),
                    "intneg",
                    OpKind::IntOp {
                        kind,
                        lhs: operand,
                        rhs: operand,
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            Some(LoweringRule::BoolOp(kind)) => {
                let kind = *kind;
                Ok(self.emit(
                    RType::bool(),
                    "not",
                    OpKind::BoolOp {
                        kind,
                        lhs: operand,
                        rhs: operand,
                    },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            Some(LoweringRule::CHelper(rule)) => {
                let rule = rule.clone();
                let (cr, ek) = self.fail_kind(rule.can_raise, &rule.result);
                Ok(self.emit(
                    rule.result,
                    "chelper",
                    OpKind::CallC {
                        c_function: rule.c_function,
                        args: CallArgs::positional(vec![operand]),
                    },
                    cr,
                    ek,
                    span,
                ))
            }
            _ if op == UnarySymbol::Neg && matches!(operand_ty, RType::RPrimitive(p) if p.kind() == mypyc_types::PrimitiveKind::Float) =>
            {
                Ok(self.emit(
                    RType::float(),
                    "floatneg",
                    OpKind::FloatNeg { src: operand },
                    CanRaise::Never,
                    ErrorKind::None,
                    span,
                ))
            }
            _ => {
                let (cr, ek) = self.fail_kind(true, &RType::object());
                Ok(self.emit(
                    RType::object(),
                    "unop_generic",
                    OpKind::CallC {
                        c_function: "CPy_GenericUnaryOp".into(),
                        args: CallArgs::positional(vec![operand]),
                    },
                    cr,
                    ek,
                    span,
                ))
            }
        }
    }

    fn lower_boolop(
        &mut self,
        is_and: bool,
        values: &[TypedExpr],
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        let join_b = self.new_block();
        let result = self.func.new_register(RType::bool(), "boolop");
        let Some((last, rest)) = values.split_last() else {
            return Err(BuildError::Internal {
                detail: "bool op with no operands".into(),
            });
        };
        for value in rest {
            let v = self.lower_expr(value)?;
            self.push_op(
                Some(result),
                OpKind::Assign { src: v },
                CanRaise::Never,
                ErrorKind::None,
                span,
            );
            let next_b = self.new_block();
            let (then_b, else_b) = if is_and {
                (next_b, join_b)
            } else {
                (join_b, next_b)
            };
            self.func.block_mut(self.cur).set_terminator(Terminator::Branch {
                cond: v,
                then_target: then_b,
                else_target: else_b,
                negate: false,
            });
            self.cur = next_b;
        }
        let v = self.lower_expr(last)?;
        self.push_op(
            Some(result),
            OpKind::Assign { src: v },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));
        self.cur = join_b;
        Ok(result)
    }

    fn lower_conditional(
        &mut self,
        test: &TypedExpr,
        body: &TypedExpr,
        orelse: &TypedExpr,
        ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        let cond = self.lower_expr(test)?;
        let then_b = self.new_block();
        let else_b = self.new_block();
        let join_b = self.new_block();
        self.func.block_mut(self.cur).set_terminator(Terminator::Branch {
            cond,
            then_target: then_b,
            else_target: else_b,
            negate: false,
        });

        let result = self.func.new_register(ty.clone(), "cond");

        self.cur = then_b;
        let then_val = self.lower_expr(body)?;
        self.push_op(
            Some(result),
            OpKind::Assign { src: then_val },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));

        self.cur = else_b;
        let else_val = self.lower_expr(orelse)?;
        self.push_op(
            Some(result),
            OpKind::Assign { src: else_val },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(join_b));

        self.cur = join_b;
        Ok(result)
    }

    fn lower_call(
        &mut self,
        func: &TypedExpr,
        args: &[TypedExpr],
        kwargs: &[(String, TypedExpr)],
        ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        if let TypedExpr::Name { name, .. } = func {
            if name == "isinstance" && args.len() == 2 && kwargs.is_empty() {
                if let TypedExpr::Name { name: class_name, .. } = &args[1] {
                    if let Some(class_ir) = self.decl.classes.get(class_name).cloned() {
                        return self.lower_isinstance(&args[0], &class_ir, span);
                    }
                }
            }
        }

        let mut arg_regs = Vec::with_capacity(args.len());
        for a in args {
            arg_regs.push(self.lower_expr(a)?);
        }

        if let TypedExpr::Name { name, .. } = func {
            let qualified = format!("{}.{}", self.module_name, name);
            if self.decl.funcs.contains_key(&qualified) && kwargs.is_empty() {
                let (can_raise, error_kind) = self.fail_kind(true, ty);
                return Ok(self.emit(
                    ty.clone(),
                    name,
                    OpKind::Call {
                        func: mypyc_ir::FuncRef::new(qualified),
                        args: CallArgs::positional(arg_regs),
                    },
                    can_raise,
                    error_kind,
                    span,
                ));
            }
        }

        let callee = self.lower_expr(func)?;
        let mut kw_regs = Vec::with_capacity(kwargs.len());
        for (name, value) in kwargs {
            let v = self.lower_expr(value)?;
            kw_regs.push((name.clone(), v));
        }
        let (can_raise, error_kind) = self.fail_kind(true, ty);
        Ok(self.emit(
            ty.clone(),
            "pycall",
            OpKind::PyCall {
                obj: callee,
                args: arg_regs,
                kwargs: kw_regs,
            },
            can_raise,
            error_kind,
            span,
        ))
    }

    /// Lowers `isinstance(obj, C)` against a class declared in this unit
    /// (§4.4): a direct type-object pointer comparison, plus — when `C`
    /// permits interpreted subclasses (`is_final` false) — a fallback to
    /// the CPython API, since a pointer compare alone would miss an
    /// interpreted subclass of `C`.
    fn lower_isinstance(
        &mut self,
        obj: &TypedExpr,
        class_ir: &mypyc_ir::ClassIr,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        let obj_reg = self.lower_expr(obj)?;
        let type_obj = self.emit(
            RType::object(),
            "type_obj",
            OpKind::LoadAddress {
                target: format!("{}_{}_Type", self.module_name, class_ir.name()),
            },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
        if class_ir.flags().is_final {
            Ok(self.emit(
                RType::bool(),
                "isinstance",
                OpKind::CallC {
                    c_function: "CPy_TypeCheckExact".into(),
                    args: CallArgs::positional(vec![obj_reg, type_obj]),
                },
                CanRaise::Never,
                ErrorKind::None,
                span,
            ))
        } else {
            let (can_raise, error_kind) = self.fail_kind(true, &RType::bool());
            Ok(self.emit(
                RType::bool(),
                "isinstance",
                OpKind::CallC {
                    c_function: "CPy_TypeCheck".into(),
                    args: CallArgs::positional(vec![obj_reg, type_obj]),
                },
                can_raise,
                error_kind,
                span,
            ))
        }
    }

    /// Lowers `yield value` to a resumption-block split (§4.4's
    /// generator state machine): the yielded value is handed to the
    /// runtime helper, and a fresh block becomes both this expression's
    /// continuation and the state the `send()` dispatcher resumes into.
    fn lower_yield(
        &mut self,
        value: Option<&TypedExpr>,
        ty: &RType,
        span: &SourceSpan,
    ) -> Result<RegisterId, BuildError> {
        if !self.func.flags().is_generator {
            return Err(BuildError::UnsupportedConstruct {
                what: "yield outside a generator function".into(),
                span: span.clone(),
            });
        }
        let value_reg = match value {
            Some(e) => Some(self.lower_expr(e)?),
            None => None,
        };
        self.push_op(
            None,
            OpKind::CallC {
                c_function: "CPyGen_Yield".into(),
                args: CallArgs::positional(value_reg.into_iter().collect()),
            },
            CanRaise::Never,
            ErrorKind::None,
            span,
        );
        let resume_b = self.new_block();
        self.func.block_mut(self.cur).set_terminator(Terminator::Goto(resume_b));
        self.cur = resume_b;
        Ok(self.emit(
            ty.clone(),
            "resumed",
            OpKind::CallC {
                c_function: "CPyGen_ResumeValue".into(),
                args: CallArgs::positional(vec![]),
            },
            CanRaise::Never,
            ErrorKind::None,
            span,
        ))
    }
}

fn compare_kind(op: CompareSymbol) -> mypyc_ir::ComparisonOpKind {
    use mypyc_ir::ComparisonOpKind as C;
    match op {
        CompareSymbol::Eq => C::Eq,
        CompareSymbol::Ne => C::Ne,
        CompareSymbol::Lt => C::Lt,
        CompareSymbol::Le => C::Le,
        CompareSymbol::Gt => C::Gt,
        CompareSymbol::Ge => C::Ge,
    }
}

/// Recursively collects `(name, type)` for every `Assign`/`AugAssign`
/// target reachable in `stmts`, not descending into nested function or
/// class bodies (their own scope). The first occurrence of a name wins
/// its type, matching a source local's single declared type.
fn collect_assigned_locals(stmts: &[TypedStmt], out: &mut Vec<(String, RType)>) {
    for stmt in stmts {
        match stmt {
            TypedStmt::Assign { target, value, .. } => {
                if !out.iter().any(|(n, _)| n == target) {
                    out.push((target.clone(), value.ty()));
                }
            }
            TypedStmt::AugAssign { target, value, .. } => {
                if !out.iter().any(|(n, _)| n == target) {
                    out.push((target.clone(), value.ty()));
                }
            }
            TypedStmt::If { body, orelse, .. } => {
                collect_assigned_locals(body, out);
                collect_assigned_locals(orelse, out);
            }
            TypedStmt::While { body, .. } => collect_assigned_locals(body, out),
            TypedStmt::For { body, .. } => collect_assigned_locals(body, out),
            TypedStmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                collect_assigned_locals(body, out);
                for h in handlers {
                    collect_assigned_locals(&h.body, out);
                }
                collect_assigned_locals(orelse, out);
                collect_assigned_locals(finalbody, out);
            }
            TypedStmt::With { body, .. } => collect_assigned_locals(body, out),
            TypedStmt::ExprStmt(_)
            | TypedStmt::Return(..)
            | TypedStmt::Raise(..)
            | TypedStmt::Break(_)
            | TypedStmt::Continue(_)
            | TypedStmt::Pass(_)
            | TypedStmt::FunctionDef(_)
            | TypedStmt::ClassDef(_) => {}
        }
    }
}

fn generic_binop_helper(op: BinarySymbol) -> &'static str {
    match op {
        BinarySymbol::Add => "CPy_GenericAdd",
        BinarySymbol::Sub => "CPy_GenericSub",
        BinarySymbol::Mul => "CPy_GenericMul",
        BinarySymbol::Div => "CPy_GenericTrueDiv",
        BinarySymbol::FloorDiv => "CPy_GenericFloorDiv",
        BinarySymbol::Mod => "CPy_GenericMod",
        BinarySymbol::Shl => "CPy_GenericLShift",
        BinarySymbol::Shr => "CPy_GenericRShift",
        BinarySymbol::BitAnd => "CPy_GenericAnd",
        BinarySymbol::BitOr => "CPy_GenericOr",
        BinarySymbol::BitXor => "CPy_GenericXor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Param;
    use mypyc_registry::RegistryBuilder;

    fn int_registry() -> Registry {
        RegistryBuilder::new()
            .register(
                OpShape::BinaryOp(BinarySymbol::Add),
                vec![RType::int(), RType::int()],
                LoweringRule::IntOp(mypyc_ir::IntOpKind::Add),
            )
            .build()
            .unwrap()
    }

    fn simple_decl() -> ModuleDecl {
        ModuleDecl::default()
    }

    #[test]
    fn add_function_lowers_to_single_intop_block() {
        let decl = simple_decl();
        let registry = int_registry();
        let func_def = TypedFunctionDef {
            name: "add".into(),
            params: vec![
                Param {
                    name: "a".into(),
                    ty: RType::int(),
                },
                Param {
                    name: "b".into(),
                    ty: RType::int(),
                },
            ],
            ret: RType::int(),
            body: vec![TypedStmt::Return(
                Some(TypedExpr::BinaryOp {
                    op: BinarySymbol::Add,
                    left: Box::new(TypedExpr::Name {
                        name: "a".into(),
                        ty: RType::int(),
                        span: SourceSpan::synthetic(),
                    }),
                    right: Box::new(TypedExpr::Name {
                        name: "b".into(),
                        ty: RType::int(),
                        span: SourceSpan::synthetic(),
                    }),
                    ty: RType::int(),
                    span: SourceSpan::synthetic(),
                }),
                SourceSpan::synthetic(),
            )],
            is_generator: false,
        };

        let mut decl = decl;
        decl.funcs.insert(
            "m.add".into(),
            mypyc_ir::Signature::new(vec![RType::int(), RType::int()], RType::int()),
        );

        let func = build_function(&func_def, "m", &decl, &registry).unwrap();
        assert_eq!(func.blocks().len(), 1);
        assert_eq!(func.blocks()[0].ops().len(), 1);
        assert!(matches!(
            func.blocks()[0].ops()[0].kind(),
            OpKind::IntOp {
                kind: mypyc_ir::IntOpKind::Add,
                ..
            }
        ));
        assert!(matches!(
            func.blocks()[0].terminator(),
            Some(Terminator::Return(Some(_)))
        ));
    }

    #[test]
    fn if_else_lowers_to_four_blocks() {
        let decl = {
            let mut d = simple_decl();
            d.funcs.insert(
                "m.pick".into(),
                mypyc_ir::Signature::new(vec![RType::bool()], RType::int()),
            );
            d
        };
        let registry = RegistryBuilder::new().build().unwrap();
        let func_def = TypedFunctionDef {
            name: "pick".into(),
            params: vec![Param {
                name: "flag".into(),
                ty: RType::bool(),
            }],
            ret: RType::int(),
            body: vec![TypedStmt::If {
                test: TypedExpr::Name {
                    name: "flag".into(),
                    ty: RType::bool(),
                    span: SourceSpan::synthetic(),
                },
                body: vec![TypedStmt::Return(
                    Some(TypedExpr::IntLiteral {
                        value: 1,
                        span: SourceSpan::synthetic(),
                    }),
                    SourceSpan::synthetic(),
                )],
                orelse: vec![TypedStmt::Return(
                    Some(TypedExpr::IntLiteral {
                        value: 0,
                        span: SourceSpan::synthetic(),
                    }),
                    SourceSpan::synthetic(),
                )],
                span: SourceSpan::synthetic(),
            }],
            is_generator: false,
        };

        let func = build_function(&func_def, "m", &decl, &registry).unwrap();
        assert_eq!(func.blocks().len(), 4);
    }

    #[test]
    fn reading_a_final_constant_lowers_to_a_literal_not_a_global_load() {
        let decl = {
            let mut d = simple_decl();
            d.finals.insert("LIMIT".into(), LiteralValue::Int(100));
            d.funcs.insert(
                "m.read_limit".into(),
                mypyc_ir::Signature::new(vec![], RType::int()),
            );
            d
        };
        let registry = RegistryBuilder::new().build().unwrap();
        let func_def = TypedFunctionDef {
            name: "read_limit".into(),
            params: vec![],
            ret: RType::int(),
            body: vec![TypedStmt::Return(
                Some(TypedExpr::Name {
                    name: "LIMIT".into(),
                    ty: RType::int(),
                    span: SourceSpan::synthetic(),
                }),
                SourceSpan::synthetic(),
            )],
            is_generator: false,
        };

        let func = build_function(&func_def, "m", &decl, &registry).unwrap();
        assert_eq!(func.blocks().len(), 1);
        assert_eq!(func.blocks()[0].ops().len(), 1);
        assert!(matches!(
            func.blocks()[0].ops()[0].kind(),
            OpKind::LoadLiteral {
                value: LiteralValue::Int(100)
            }
        ));
    }

    fn isinstance_call(class_name: &str) -> TypedExpr {
        TypedExpr::Call {
            func: Box::new(TypedExpr::Name {
                name: "isinstance".into(),
                ty: RType::bool(),
                span: SourceSpan::synthetic(),
            }),
            args: vec![
                TypedExpr::Name {
                    name: "x".into(),
                    ty: RType::object(),
                    span: SourceSpan::synthetic(),
                },
                TypedExpr::Name {
                    name: class_name.into(),
                    ty: RType::object(),
                    span: SourceSpan::synthetic(),
                },
            ],
            kwargs: vec![],
            ty: RType::bool(),
            span: SourceSpan::synthetic(),
        }
    }

    fn isinstance_check_func_def() -> TypedFunctionDef {
        TypedFunctionDef {
            name: "check".into(),
            params: vec![Param {
                name: "x".into(),
                ty: RType::object(),
            }],
            ret: RType::bool(),
            body: vec![TypedStmt::Return(
                Some(isinstance_call("Widget")),
                SourceSpan::synthetic(),
            )],
            is_generator: false,
        }
    }

    #[test]
    fn isinstance_against_a_final_class_lowers_to_pointer_compare_only() {
        let mut decl = simple_decl();
        let mut flags = mypyc_ir::ClassFlags::default();
        flags.is_final = true;
        decl.classes.insert(
            "Widget".into(),
            mypyc_ir::ClassIr::new(mypyc_ir::ClassId::from_raw(0), "Widget", None, flags),
        );
        decl.funcs.insert(
            "m.check".into(),
            mypyc_ir::Signature::new(vec![RType::object()], RType::bool()),
        );
        let registry = RegistryBuilder::new().build().unwrap();

        let func = build_function(&isinstance_check_func_def(), "m", &decl, &registry).unwrap();
        let ops = func.blocks()[0].ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0].kind(), OpKind::LoadAddress { .. }));
        match ops[1].kind() {
            OpKind::CallC { c_function, args } => {
                assert_eq!(c_function.as_str(), "CPy_TypeCheckExact");
                assert_eq!(args.positional.len(), 2);
            }
            other => panic!("expected CallC, got {other:?}"),
        }
        assert_eq!(ops[1].can_raise(), CanRaise::Never);
    }

    #[test]
    fn isinstance_against_a_non_final_class_falls_back_to_the_cpython_api() {
        let decl = {
            let mut d = simple_decl();
            d.classes.insert(
                "Widget".into(),
                mypyc_ir::ClassIr::new(
                    mypyc_ir::ClassId::from_raw(0),
                    "Widget",
                    None,
                    mypyc_ir::ClassFlags::default(),
                ),
            );
            d.funcs.insert(
                "m.check".into(),
                mypyc_ir::Signature::new(vec![RType::object()], RType::bool()),
            );
            d
        };
        let registry = RegistryBuilder::new().build().unwrap();

        let func = build_function(&isinstance_check_func_def(), "m", &decl, &registry).unwrap();
        let ops = func.blocks()[0].ops();
        assert_eq!(ops.len(), 2);
        match ops[1].kind() {
            OpKind::CallC { c_function, .. } => {
                assert_eq!(c_function.as_str(), "CPy_TypeCheck");
            }
            other => panic!("expected CallC, got {other:?}"),
        }
        assert_eq!(ops[1].can_raise(), CanRaise::May);
    }
}
