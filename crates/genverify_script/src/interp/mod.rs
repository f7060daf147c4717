//! Tree-walking interpreter.
//!
//! One [`Interpreter`] owns one global environment. Successive [`Interpreter::run`] calls share it, the
//! way consecutive `<script>` elements on a page share `window`.
//!
//! ## Examples
//!
//! ```rust
//! use genverify_script::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.run("var ns = {}; ns.greet = function (who) { return 'hi ' + who; };").unwrap();
//! let value = interp.run("ns.greet('there')").unwrap();
//! assert_eq!(value.to_js_string(), "hi there");
//! ```

mod builtins;
pub mod scope;
pub mod value;

use std::collections::HashMap;
use std::rc::Rc;

use tracing::instrument;

use crate::ast::*;
use crate::diagnostics::ScriptError;
use crate::parser;
use scope::{Scope, ScopeRef};
pub use value::{Callable, Closure, NativeFn, ObjRef, Object, ObjectKind, Value, number_to_string};

/// Statements and calls a single `run` may execute before it is abandoned.
pub const DEFAULT_STEP_LIMIT: u64 = 5_000_000;

/// Nested script calls allowed before a `RangeError` is thrown.
///
/// Each script call costs several native frames, so hosts raising this should also size the thread stack.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// How a statement finished.
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Non-local exit while evaluating.
pub enum Abrupt {
    /// A script exception. Script `catch` blocks see these.
    Throw(Value, Span),
    /// Ends the whole run. Script code cannot catch it.
    Fatal(ScriptError),
}

/// A callback queued by `setTimeout` or `setInterval`.
struct Timer {
    id: u64,
    /// Virtual milliseconds since the interpreter was created.
    due: u64,
    interval: Option<u64>,
    callback: Value,
    args: Vec<Value>,
    span: Span,
}

/// Assignment target resolved before the right-hand side is evaluated.
enum Reference {
    Binding(String),
    Property(Value, String),
}

pub struct Interpreter {
    global: ObjRef,
    global_scope: ScopeRef,
    object_proto: ObjRef,
    function_proto: ObjRef,
    array_proto: ObjRef,
    string_proto: ObjRef,
    error_protos: HashMap<&'static str, ObjRef>,
    this_stack: Vec<Value>,
    call_depth: usize,
    max_call_depth: usize,
    steps: u64,
    step_limit: u64,
    last_value: Value,
    timers: Vec<Timer>,
    next_timer_id: u64,
    clock: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let object_proto = Object::new(ObjectKind::Ordinary, None);
        let function_proto = Object::new(ObjectKind::Ordinary, Some(object_proto.clone()));
        let array_proto = Object::new(ObjectKind::Ordinary, Some(object_proto.clone()));
        let string_proto = Object::new(ObjectKind::Ordinary, Some(object_proto.clone()));
        let global = Object::new(ObjectKind::Ordinary, Some(object_proto.clone()));
        let global_scope = Scope::global(global.clone());

        let mut interp = Interpreter {
            global,
            global_scope,
            object_proto,
            function_proto,
            array_proto,
            string_proto,
            error_protos: HashMap::new(),
            this_stack: Vec::new(),
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            last_value: Value::Undefined,
            timers: Vec::new(),
            next_timer_id: 0,
            clock: 0,
        };
        builtins::install(&mut interp);
        interp
    }

    /// Cap the number of steps each `run` may take.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Cap the nesting of script calls.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Expose a host function to scripts as a global.
    pub fn define_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        let func = self.native(name, move |_, _, args, _| Ok(f(args)));
        self.set_global(name, func);
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.global.borrow_mut().properties.insert(name.to_string(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.global.borrow().properties.get(name).cloned()
    }

    /// Parse and execute `source` against the shared global environment.
    ///
    /// Returns the value of the last top-level expression statement.
    #[instrument(skip_all, fields(source_len = source.len()))]
    pub fn run(&mut self, source: &str) -> Result<Value, ScriptError> {
        let program = parser::parse_source(source)?;
        self.steps = 0;
        self.call_depth = 0;
        self.this_stack.clear();
        self.last_value = Value::Undefined;

        let scope = self.global_scope.clone();
        match self.run_body(&program.body, &scope) {
            Ok(_) => Ok(std::mem::take(&mut self.last_value)),
            Err(abrupt) => Err(uncaught(abrupt)),
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Queue `callback` to run `delay` virtual milliseconds from now. Returns the timer id.
    pub(crate) fn schedule(&mut self, callback: Value, delay: f64, args: Vec<Value>, repeat: bool, span: Span) -> u64 {
        let delay = if delay.is_finite() && delay > 0.0 { delay as u64 } else { 0 };
        self.next_timer_id += 1;
        let id = self.next_timer_id;
        self.timers.push(Timer {
            id,
            due: self.clock.saturating_add(delay),
            interval: repeat.then_some(delay.max(1)),
            callback,
            args,
            span,
        });
        id
    }

    pub(crate) fn clear_timer(&mut self, id: u64) {
        self.timers.retain(|timer| timer.id != id);
    }

    /// Number of queued timer callbacks.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Run the earliest queued timer callback, advancing the virtual clock to its due time.
    ///
    /// Returns `None` once the queue is empty. An interval is queued again before its callback runs,
    /// so the callback can clear it. Each callback gets a fresh step budget.
    pub fn run_next_timer(&mut self) -> Option<Result<Value, ScriptError>> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, timer)| (timer.due, timer.id))
            .map(|(index, _)| index)?;
        let timer = self.timers.remove(index);
        self.clock = self.clock.max(timer.due);
        if let Some(interval) = timer.interval {
            self.timers.push(Timer {
                id: timer.id,
                due: self.clock.saturating_add(interval),
                interval: timer.interval,
                callback: timer.callback.clone(),
                args: timer.args.clone(),
                span: timer.span,
            });
        }

        if let Value::String(source) = &timer.callback {
            return Some(self.run(source));
        }
        self.steps = 0;
        self.call_depth = 0;
        self.this_stack.clear();
        let result = self.call_value(&timer.callback, Value::Undefined, &timer.args, timer.span);
        Some(result.map_err(uncaught))
    }

    // ========================================================================
    // Object construction
    // ========================================================================

    pub fn new_object(&self) -> ObjRef {
        Object::new(ObjectKind::Ordinary, Some(self.object_proto.clone()))
    }

    pub fn new_array(&self, items: Vec<Value>) -> Value {
        Value::Object(Object::new(ObjectKind::Array(items), Some(self.array_proto.clone())))
    }

    /// Wrap a Rust closure as a callable script value.
    pub fn native<F>(&self, name: &str, f: F) -> Value
    where
        F: Fn(&mut Interpreter, &Value, &[Value], Span) -> Result<Value, Abrupt> + 'static,
    {
        let callable = Callable::Native {
            name: name.into(),
            func: Rc::new(f),
        };
        Value::Object(Object::new(ObjectKind::Function(callable), Some(self.function_proto.clone())))
    }

    fn make_function(&self, decl: &Rc<FunctionDecl>, scope: &ScopeRef) -> Value {
        let closure = Closure {
            decl: decl.clone(),
            scope: scope.clone(),
        };
        let func = Object::new(
            ObjectKind::Function(Callable::Script(Rc::new(closure))),
            Some(self.function_proto.clone()),
        );
        let prototype = self.new_object();
        prototype
            .borrow_mut()
            .properties
            .insert("constructor".to_string(), Value::Object(func.clone()));
        func.borrow_mut()
            .properties
            .insert("prototype".to_string(), Value::Object(prototype));
        Value::Object(func)
    }

    /// An error object of the given builtin kind (`TypeError`, `RangeError`, ...).
    pub fn make_error(&self, kind: &str, message: impl Into<String>) -> Value {
        let prototype = self
            .error_protos
            .get(kind)
            .or_else(|| self.error_protos.get("Error"))
            .cloned()
            .unwrap_or_else(|| self.object_proto.clone());
        let error = Object::new(ObjectKind::Ordinary, Some(prototype));
        error
            .borrow_mut()
            .properties
            .insert("message".to_string(), Value::from(message.into()));
        Value::Object(error)
    }

    pub fn throw(&self, kind: &str, message: impl Into<String>, span: Span) -> Abrupt {
        Abrupt::Throw(self.make_error(kind, message), span)
    }

    fn tick(&mut self, span: Span) -> Result<(), Abrupt> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(Abrupt::Fatal(ScriptError::BudgetExhausted {
                limit: self.step_limit,
                span,
            }));
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Execute a program or function body: hoist `var` names, then run.
    fn run_body(&mut self, stmts: &[Spanned<Stmt>], scope: &ScopeRef) -> Result<Completion, Abrupt> {
        hoist_vars(stmts, scope);
        self.exec_statements(stmts, scope)
    }

    fn exec_statements(&mut self, stmts: &[Spanned<Stmt>], scope: &ScopeRef) -> Result<Completion, Abrupt> {
        for stmt in stmts {
            if let Stmt::Function(decl) = &stmt.node {
                if let Some(name) = &decl.name {
                    let func = self.make_function(decl, scope);
                    Scope::declare(scope, name, func);
                }
            }
        }
        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec(&mut self, stmt: &Spanned<Stmt>, scope: &ScopeRef) -> Result<Completion, Abrupt> {
        self.tick(stmt.span)?;
        match &stmt.node {
            Stmt::Var(_, declarators) => {
                for declarator in declarators {
                    match &declarator.init {
                        Some(init) => {
                            let value = self.eval(init, scope)?;
                            Scope::declare(scope, &declarator.name, value);
                        }
                        None => Scope::hoist(scope, &declarator.name),
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(expr) => {
                let value = self.eval(expr, scope)?;
                if self.call_depth == 0 {
                    self.last_value = value;
                }
                Ok(Completion::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                then_branch,
                else_branch,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec(init, scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::ForIn { name, object, body } => {
                let keys = match self.eval(object, scope)? {
                    Value::Object(obj) => obj.borrow().own_keys(),
                    Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
                    _ => Vec::new(),
                };
                for key in keys {
                    Scope::assign(scope, name, Value::from(key));
                    match self.exec(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Block(stmts) => self.exec_statements(stmts, scope),
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Throw(value) => {
                let value = self.eval(value, scope)?;
                Err(Abrupt::Throw(value, stmt.span))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let result = match (self.exec_statements(block, scope), handler) {
                    (Err(Abrupt::Throw(value, _)), Some(handler)) => {
                        if let Some(param) = &handler.param {
                            Scope::declare(scope, param, value);
                        }
                        self.exec_statements(&handler.body, scope)
                    }
                    (other, _) => other,
                };
                if let Some(finalizer) = finalizer {
                    if !matches!(result, Err(Abrupt::Fatal(_))) {
                        match self.exec_statements(finalizer, scope)? {
                            Completion::Normal => {}
                            other => return Ok(other),
                        }
                    }
                }
                result
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &Spanned<Expr>, scope: &ScopeRef) -> Result<Value, Abrupt> {
        let span = expr.span;
        match &expr.node {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => self.lookup_identifier(name, scope, span),
            Expr::This => Ok(self
                .this_stack
                .last()
                .cloned()
                .unwrap_or_else(|| Value::Object(self.global.clone()))),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(self.new_array(values))
            }
            Expr::Object(props) => {
                let object = self.new_object();
                for (key, value) in props {
                    let value = self.eval(value, scope)?;
                    object.borrow_mut().properties.insert(key.clone(), value);
                }
                Ok(Value::Object(object))
            }
            Expr::Function(decl) => Ok(self.make_function(decl, scope)),
            Expr::Unary(op, operand) => {
                if *op == UnaryOp::Typeof {
                    if let Expr::Ident(name) = &operand.node {
                        if Scope::lookup(scope, name).is_none() {
                            return Ok(Value::from("undefined"));
                        }
                    }
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::from(value.type_of()),
                })
            }
            Expr::Update { op, prefix, target } => {
                let reference = self.reference(target, scope)?;
                let old = self.get_reference(&reference, scope, span)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), scope, span)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right, span)
            }
            Expr::Logical(left, op, right) => {
                let left = self.eval(left, scope)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => self.eval(right, scope),
                    _ => Ok(left),
                }
            }
            Expr::Assign { op, target, value } => {
                let reference = self.reference(target, scope)?;
                let result = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(bin) => {
                        let current = self.get_reference(&reference, scope, span)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(*bin, &current, &rhs, span)?
                    }
                };
                self.put_reference(&reference, result.clone(), scope, span)?;
                Ok(result)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Member(object, name) => {
                let target = self.eval(object, scope)?;
                self.get_property(&target, name, span)
            }
            Expr::Index(object, index) => {
                let target = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_js_string();
                self.get_property(&target, &key, span)
            }
            Expr::Call(callee, args) => {
                let (this, func) = match &callee.node {
                    Expr::Member(object, name) => {
                        let target = self.eval(object, scope)?;
                        let func = self.get_property(&target, name, callee.span)?;
                        (target, func)
                    }
                    Expr::Index(object, index) => {
                        let target = self.eval(object, scope)?;
                        let key = self.eval(index, scope)?.to_js_string();
                        let func = self.get_property(&target, &key, callee.span)?;
                        (target, func)
                    }
                    _ => (Value::Undefined, self.eval(callee, scope)?),
                };
                let args = self.eval_args(args, scope)?;
                if !func.is_callable() {
                    return Err(self.throw("TypeError", format!("{} is not a function", describe(&callee.node)), span));
                }
                self.call_value(&func, this, &args, span)
            }
            Expr::New(callee, args) => {
                let ctor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                if !ctor.is_callable() {
                    return Err(self.throw(
                        "TypeError",
                        format!("{} is not a constructor", describe(&callee.node)),
                        span,
                    ));
                }
                self.construct(&ctor, &args, span)
            }
        }
    }

    fn eval_args(&mut self, args: &[Spanned<Expr>], scope: &ScopeRef) -> Result<Vec<Value>, Abrupt> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        Ok(values)
    }

    fn lookup_identifier(&self, name: &str, scope: &ScopeRef, span: Span) -> Result<Value, Abrupt> {
        Scope::lookup(scope, name).ok_or_else(|| self.throw("ReferenceError", format!("{} is not defined", name), span))
    }

    fn reference(&mut self, target: &Spanned<Expr>, scope: &ScopeRef) -> Result<Reference, Abrupt> {
        match &target.node {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member(object, name) => Ok(Reference::Property(self.eval(object, scope)?, name.clone())),
            Expr::Index(object, index) => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_js_string();
                Ok(Reference::Property(object, key))
            }
            _ => Err(self.throw("SyntaxError", "Invalid assignment target", target.span)),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef, span: Span) -> Result<Value, Abrupt> {
        match reference {
            Reference::Binding(name) => self.lookup_identifier(name, scope, span),
            Reference::Property(target, key) => self.get_property(target, key, span),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Value, scope: &ScopeRef, span: Span) -> Result<(), Abrupt> {
        match reference {
            Reference::Binding(name) => {
                Scope::assign(scope, name, value);
                Ok(())
            }
            Reference::Property(target, key) => self.set_property(target, key, value, span),
        }
    }

    // ========================================================================
    // Properties, calls and operators
    // ========================================================================

    pub fn get_property(&mut self, target: &Value, key: &str, span: Span) -> Result<Value, Abrupt> {
        let start = match target {
            Value::Undefined | Value::Null => {
                return Err(self.throw(
                    "TypeError",
                    format!("Cannot read properties of {} (reading '{}')", target.to_js_string(), key),
                    span,
                ));
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = value::array_index(key) {
                    return Ok(s.chars().nth(index).map_or(Value::Undefined, |c| Value::from(c.to_string())));
                }
                self.string_proto.clone()
            }
            Value::Number(_) | Value::Bool(_) => self.object_proto.clone(),
            Value::Object(obj) => obj.clone(),
        };
        Ok(value::lookup_property(&start, key).unwrap_or_default())
    }

    pub fn set_property(&mut self, target: &Value, key: &str, value: Value, span: Span) -> Result<(), Abrupt> {
        match target {
            Value::Undefined | Value::Null => Err(self.throw(
                "TypeError",
                format!("Cannot set properties of {} (setting '{}')", target.to_js_string(), key),
                span,
            )),
            Value::Object(obj) => {
                obj.borrow_mut().set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Invoke `func` with an explicit `this`.
    pub fn call_value(&mut self, func: &Value, this: Value, args: &[Value], span: Span) -> Result<Value, Abrupt> {
        let callable = func.as_object().and_then(|obj| match &obj.borrow().kind {
            ObjectKind::Function(callable) => Some(callable.clone()),
            _ => None,
        });
        let Some(callable) = callable else {
            return Err(self.throw("TypeError", format!("{} is not a function", func.type_of()), span));
        };
        if self.call_depth >= self.max_call_depth {
            return Err(self.throw("RangeError", "Maximum call stack size exceeded", span));
        }
        self.tick(span)?;

        self.call_depth += 1;
        let result = match callable {
            Callable::Native { func: native, .. } => native(self, &this, args, span),
            Callable::Script(closure) => self.call_script(&closure, func, this, args),
        };
        self.call_depth -= 1;
        result
    }

    fn call_script(&mut self, closure: &Closure, callee: &Value, this: Value, args: &[Value]) -> Result<Value, Abrupt> {
        let scope = Scope::child(&closure.scope);
        if let Some(name) = &closure.decl.name {
            Scope::declare(&scope, name, callee.clone());
        }
        Scope::declare(&scope, "arguments", self.new_array(args.to_vec()));
        for (i, param) in closure.decl.params.iter().enumerate() {
            Scope::declare(&scope, param, args.get(i).cloned().unwrap_or_default());
        }

        let this = match this {
            Value::Undefined | Value::Null => Value::Object(self.global.clone()),
            other => other,
        };
        self.this_stack.push(this);
        let result = self.run_body(&closure.decl.body, &scope);
        self.this_stack.pop();

        match result? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    /// `new ctor(...args)`
    pub fn construct(&mut self, ctor: &Value, args: &[Value], span: Span) -> Result<Value, Abrupt> {
        if !ctor.is_callable() {
            return Err(self.throw("TypeError", format!("{} is not a constructor", ctor.type_of()), span));
        }
        let prototype = match self.get_property(ctor, "prototype", span)? {
            Value::Object(prototype) => prototype,
            _ => self.object_proto.clone(),
        };
        let instance = Value::Object(Object::new(ObjectKind::Ordinary, Some(prototype)));
        let result = self.call_value(ctor, instance.clone(), args, span)?;
        Ok(if matches!(result, Value::Object(_)) { result } else { instance })
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value, Abrupt> {
        Ok(match op {
            BinaryOp::Add => {
                let (left, right) = (to_primitive(left), to_primitive(right));
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    Value::from(format!("{}{}", left.to_js_string(), right.to_js_string()))
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
            BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
            BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
            BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
            BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
            BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => Value::Bool(compare(op, left, right)),
            BinaryOp::Instanceof => Value::Bool(self.instance_of(left, right, span)?),
            BinaryOp::In => {
                let key = left.to_js_string();
                let Value::Object(object) = right else {
                    return Err(self.throw(
                        "TypeError",
                        format!("Cannot use 'in' operator to search for '{}' in {}", key, right.to_js_string()),
                        span,
                    ));
                };
                Value::Bool(has_property(object, &key))
            }
        })
    }

    fn instance_of(&mut self, value: &Value, ctor: &Value, span: Span) -> Result<bool, Abrupt> {
        if !ctor.is_callable() {
            return Err(self.throw("TypeError", "Right-hand side of 'instanceof' is not callable", span));
        }
        let Value::Object(prototype) = self.get_property(ctor, "prototype", span)? else {
            return Ok(false);
        };
        let Value::Object(object) = value else {
            return Ok(false);
        };
        let mut current = object.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &prototype) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(false)
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::from(value.to_js_string()),
        other => other.clone(),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let (left, right) = (to_primitive(left), to_primitive(right));
    if let (Value::String(a), Value::String(b)) = (&left, &right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        _ => a >= b,
    }
}

fn has_property(object: &ObjRef, key: &str) -> bool {
    let mut current = Some(object.clone());
    while let Some(candidate) = current {
        let borrowed = candidate.borrow();
        if borrowed.has_own(key) {
            return true;
        }
        current = borrowed.prototype.clone();
    }
    false
}

/// Short source-like rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member(object, name) => format!("{}.{}", describe(&object.node), name),
        Expr::Index(object, _) => format!("{}[...]", describe(&object.node)),
        Expr::Call(callee, _) => format!("{}(...)", describe(&callee.node)),
        _ => "expression".to_string(),
    }
}

fn uncaught(abrupt: Abrupt) -> ScriptError {
    match abrupt {
        Abrupt::Throw(value, span) => ScriptError::Uncaught {
            message: value.to_js_string(),
            span,
        },
        Abrupt::Fatal(err) => err,
    }
}

/// Declare every `var` in `stmts` (not inside nested functions) as `undefined`.
fn hoist_vars(stmts: &[Spanned<Stmt>], scope: &ScopeRef) {
    for stmt in stmts {
        hoist_stmt(&stmt.node, scope);
    }
}

fn hoist_stmt(stmt: &Stmt, scope: &ScopeRef) {
    match stmt {
        Stmt::Var(_, declarators) => {
            for declarator in declarators {
                Scope::hoist(scope, &declarator.name);
            }
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            hoist_stmt(&then_branch.node, scope);
            if let Some(else_branch) = else_branch {
                hoist_stmt(&else_branch.node, scope);
            }
        }
        Stmt::While { body, .. } => hoist_stmt(&body.node, scope),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                hoist_stmt(&init.node, scope);
            }
            hoist_stmt(&body.node, scope);
        }
        Stmt::ForIn { name, body, .. } => {
            Scope::hoist(scope, name);
            hoist_stmt(&body.node, scope);
        }
        Stmt::Block(stmts) => hoist_vars(stmts, scope),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            hoist_vars(block, scope);
            if let Some(handler) = handler {
                hoist_vars(&handler.body, scope);
            }
            if let Some(finalizer) = finalizer {
                hoist_vars(finalizer, scope);
            }
        }
        _ => {}
    }
}
