//! Tree-walking evaluator for executable bodies

use super::ast::*;
use super::limits::{array_length, check_array_len, check_string_len, resize_array};
use super::methods::{self, MUTATING};
use super::value::Value;
use super::{globals, Host, ScriptError, ScriptResult};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Default limit on nested calls; deeper calls raise a `RangeError`.
pub const MAX_CALL_DEPTH: usize = 64;

const CALLBACK_METHODS: &[&str] = &[
    "map", "filter", "forEach", "reduce", "find", "findIndex", "findLast", "some", "every",
    "flatMap",
];

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a statement finished.
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Debug)]
struct Binding {
    value: Value,
    constant: bool,
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
}

/// An assignable location: a variable and a property path below it.
struct Place {
    root: String,
    keys: Vec<String>,
}

/// Evaluates a parsed program against a [`Host`].
///
/// Function calls see the variables of their callers (scopes are dynamic);
/// values are copied on assignment.
pub struct Interpreter {
    host: Arc<dyn Host>,
    scopes: Vec<Scope>,
    depth: usize,
    max_depth: usize,
}

impl Interpreter {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            scopes: vec![Scope::default()],
            depth: 0,
            max_depth: MAX_CALL_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bind a variable in the outermost scope.
    pub fn bind(&mut self, name: &str, value: Value) {
        if let Some(global) = self.scopes.first_mut() {
            global.bindings.insert(
                name.to_string(),
                Binding {
                    value,
                    constant: false,
                },
            );
        }
    }

    /// Run a program. A top-level `return` ends it with that value.
    pub async fn run(&mut self, program: &Program) -> ScriptResult<Value> {
        match self.exec_stmts(program).await? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    // Scopes

    fn define(&mut self, name: &str, value: Value, constant: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope
                .bindings
                .insert(name.to_string(), Binding { value, constant });
        }
    }

    fn define_function(&mut self, def: &Arc<FunctionDef>) {
        if let Some(name) = &def.name {
            self.define(name, Value::Function(Arc::clone(def)), false);
        }
    }

    fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .map(|binding| binding.value.clone())
            .or_else(|| globals::lookup(name))
    }

    fn variable(&self, name: &str) -> ScriptResult<Value> {
        self.lookup(name)
            .ok_or_else(|| ScriptError::Reference(format!("{name} is not defined")))
    }

    fn hoist(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                self.define_function(def);
            }
        }
    }

    // Statements

    fn exec<'a>(&'a mut self, stmt: &'a Stmt) -> BoxFuture<'a, ScriptResult<Flow>> {
        Box::pin(self.exec_stmt(stmt))
    }

    async fn exec_stmts(&mut self, stmts: &[Stmt]) -> ScriptResult<Flow> {
        self.hoist(stmts);
        for stmt in stmts {
            match self.exec(stmt).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    async fn exec_scoped(&mut self, stmts: &[Stmt]) -> ScriptResult<Flow> {
        self.scopes.push(Scope::default());
        let result = self.exec_stmts(stmts).await;
        self.scopes.pop();
        result
    }

    async fn exec_stmt(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr).await?;
                Ok(Flow::Normal)
            }
            Stmt::Declare {
                constant,
                declarators,
            } => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init).await?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&declarator.pattern, value, *constant)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(def) => {
                self.define_function(def);
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_scoped(stmts).await,
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test).await?.truthy() {
                    self.exec(consequent).await
                } else if let Some(alternate) = alternate {
                    self.exec(alternate).await
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test).await?.truthy() {
                    match self.exec(body).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    match self.exec(body).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test).await?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.scopes.push(Scope::default());
                let result = self
                    .exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body)
                    .await;
                self.scopes.pop();
                result
            }
            Stmt::ForEach {
                pattern,
                keys,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable).await?;
                for item in iteration_items(iterable, *keys)? {
                    self.scopes.push(Scope::default());
                    let result = match self.bind_pattern(pattern, item, false) {
                        Ok(()) => self.exec(body).await,
                        Err(e) => Err(e),
                    };
                    self.scopes.pop();
                    match result? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr).await?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => Err(ScriptError::Thrown(self.eval(expr).await?)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                self.exec_try(block, param.as_deref(), handler.as_deref(), finalizer.as_deref())
                    .await
            }
        }
    }

    async fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> ScriptResult<Flow> {
        if let Some(init) = init {
            self.exec(init).await?;
        }
        loop {
            if let Some(test) = test {
                if !self.eval(test).await?.truthy() {
                    break;
                }
            }
            match self.exec(body).await? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(update) = update {
                self.eval(update).await?;
            }
        }
        Ok(Flow::Normal)
    }

    async fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&str>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
    ) -> ScriptResult<Flow> {
        let mut outcome = self.exec_scoped(block).await;

        if let Err(error) = &outcome {
            if let (Some(handler), Some(caught)) = (handler, error.to_catch_value()) {
                self.scopes.push(Scope::default());
                if let Some(param) = param {
                    self.define(param, caught, false);
                }
                outcome = self.exec_stmts(handler).await;
                self.scopes.pop();
            }
        }

        // An exit request skips `finally`.
        if matches!(outcome, Err(ScriptError::Exit(_))) {
            return outcome;
        }
        if let Some(finalizer) = finalizer {
            match self.exec_scoped(finalizer).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        outcome
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, constant: bool) -> ScriptResult<()> {
        match pattern {
            Pattern::Ident(name) => self.define(name, value, constant),
            Pattern::Object(fields) => {
                if value.is_nullish() {
                    return Err(ScriptError::Type(format!(
                        "Cannot destructure '{value}' as it is {value}."
                    )));
                }
                for (key, local) in fields {
                    let field = self.member(&value, key)?;
                    self.define(local, field, constant);
                }
            }
            Pattern::Array(slots) => {
                let items = match value {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    other => {
                        return Err(ScriptError::Type(format!("{other} is not iterable")));
                    }
                };
                for (i, slot) in slots.iter().enumerate() {
                    if let Some(name) = slot {
                        let item = items.get(i).cloned().unwrap_or(Value::Undefined);
                        self.define(name, item, constant);
                    }
                }
            }
        }
        Ok(())
    }

    // Expressions

    fn eval<'a>(&'a mut self, expr: &'a Expr) -> BoxFuture<'a, ScriptResult<Value>> {
        Box::pin(self.eval_expr(expr))
    }

    async fn eval_expr(&mut self, expr: &Expr) -> ScriptResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Str(s) => out.push_str(s),
                        TemplateSegment::Expr(expr) => {
                            let part = self.eval(expr).await?.to_string();
                            check_string_len(out.len() + part.len())?;
                            out.push_str(&part);
                        }
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Ident(name) => self.variable(name),
            Expr::Array(items) => Ok(Value::Array(self.eval_list(items).await?)),
            Expr::Object(props) => self.eval_object(props).await,
            Expr::Spread(_) => Err(ScriptError::Syntax("Unexpected token '...'".to_string())),
            Expr::Function(def) => Ok(Value::Function(Arc::clone(def))),
            Expr::Await(inner) => self.eval(inner).await,
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object).await?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                self.member(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object).await?;
                let key = self.eval(index).await?.to_string();
                self.member(&target, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args).await,
            Expr::Unary { op, expr } => {
                if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, &**expr) {
                    let kind = self.lookup(name).map_or("undefined", |v| v.type_of());
                    return Ok(Value::string(kind));
                }
                let value = self.eval(expr).await?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::string(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left).await?;
                let right = self.eval(right).await?;
                binary_op(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left).await?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right).await
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test).await?.truthy() {
                    self.eval(consequent).await
                } else {
                    self.eval(alternate).await
                }
            }
            Expr::Assign { op, target, value } => {
                let place = self.place(target).await?;
                let value = match op {
                    None => self.eval(value).await?,
                    Some(op) => {
                        let current = self.read_place(&place)?;
                        let rhs = self.eval(value).await?;
                        binary_op(*op, &current, &rhs)?
                    }
                };
                self.write_place(&place, value.clone())?;
                Ok(value)
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let place = self.place(target).await?;
                let old = self.read_place(&place)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_place(&place, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
        }
    }

    /// Evaluate a list that may contain `...spread` items.
    async fn eval_list(&mut self, items: &[Expr]) -> ScriptResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if let Expr::Spread(inner) = item {
                match self.eval(inner).await? {
                    Value::Array(spread) => {
                        check_array_len(values.len() + spread.len())?;
                        values.extend(spread);
                    }
                    Value::String(s) => values.extend(s.chars().map(|c| Value::String(c.to_string()))),
                    other => {
                        return Err(ScriptError::Type(format!("{other} is not iterable")));
                    }
                }
            } else {
                values.push(self.eval(item).await?);
            }
        }
        Ok(values)
    }

    async fn eval_object(&mut self, props: &[Property]) -> ScriptResult<Value> {
        let mut map = BTreeMap::new();
        for prop in props {
            match prop {
                Property::KeyValue(key, expr) => {
                    let value = self.eval(expr).await?;
                    map.insert(key.clone(), value);
                }
                Property::Spread(expr) => match self.eval(expr).await? {
                    Value::Object(source) => map.extend(source),
                    Value::Array(items) => {
                        map.extend(items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)));
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::Object(map))
    }

    /// Property read on any value.
    fn member(&self, target: &Value, name: &str) -> ScriptResult<Value> {
        match target {
            Value::Undefined | Value::Null => Err(ScriptError::Type(format!(
                "Cannot read properties of {target} (reading '{name}')"
            ))),
            Value::Host(object) => Ok(match self.host.get(object.path(), name) {
                Some(value) => value,
                None if self.host.has_method(object.path(), name) => Value::HostMethod {
                    object: object.path().to_string(),
                    method: name.to_string(),
                },
                None => Value::Undefined,
            }),
            Value::Native(native) if native.is_namespace() => {
                Ok(globals::member(native.namespace, name).unwrap_or(Value::Undefined))
            }
            other => Ok(methods::property(other, name)),
        }
    }

    // Calls

    async fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> ScriptResult<Value> {
        let (object, name) = match callee {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let receiver = self.eval(object).await?;
                if *optional && receiver.is_nullish() {
                    return Ok(Value::Undefined);
                }
                (Some((&**object, receiver)), property.clone())
            }
            Expr::Index { object, index } => {
                let receiver = self.eval(object).await?;
                let key = self.eval(index).await?.to_string();
                (Some((&**object, receiver)), key)
            }
            _ => (None, String::new()),
        };

        match object {
            Some((object, receiver)) => {
                let args = self.eval_list(args).await?;
                self.call_method(object, receiver, &name, args).await
            }
            None => {
                let function = self.eval(callee).await?;
                let args = self.eval_list(args).await?;
                self.invoke(&function, args, &describe(callee)).await
            }
        }
    }

    async fn call_method(
        &mut self,
        object: &Expr,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let label = format!("{}.{name}", describe(object));
        match &receiver {
            Value::Host(host_object) if self.host.has_method(host_object.path(), name) => {
                debug!(object = host_object.path(), method = name, "host call");
                return self.host.call(host_object.path(), name, args).await;
            }
            Value::Host(_) | Value::Native(_) | Value::Undefined | Value::Null => {
                let function = self.member(&receiver, name)?;
                return self.invoke(&function, args, &label).await;
            }
            Value::Object(map) => {
                if let Some(function) = map.get(name).filter(|v| v.is_callable()).cloned() {
                    return self.invoke(&function, args, &label).await;
                }
            }
            Value::Array(items) => {
                if name == "sort" && args.first().is_some_and(Value::is_callable) {
                    let sorted = Value::Array(self.sort_with(items.clone(), &args[0]).await?);
                    self.write_back(object, sorted.clone()).await?;
                    return Ok(sorted);
                }
                if CALLBACK_METHODS.contains(&name) {
                    return self.array_callback(items, name, &args, &label).await;
                }
            }
            _ => {}
        }

        let mutating = matches!(receiver, Value::Array(_)) && MUTATING.contains(&name);
        let mut receiver = receiver;
        match methods::call(&mut receiver, name, &args)? {
            Some(result) => {
                if mutating {
                    self.write_back(object, receiver).await?;
                }
                Ok(result)
            }
            None => Err(ScriptError::Type(format!("{label} is not a function"))),
        }
    }

    /// Store a modified receiver back where it came from, when that is a variable or property.
    async fn write_back(&mut self, object: &Expr, value: Value) -> ScriptResult<()> {
        if object.is_place() {
            let place = self.place(object).await?;
            self.store(&place, value, true)?;
        }
        Ok(())
    }

    fn invoke<'a>(
        &'a mut self,
        function: &'a Value,
        args: Vec<Value>,
        label: &'a str,
    ) -> BoxFuture<'a, ScriptResult<Value>> {
        Box::pin(async move {
            match function {
                Value::Function(def) => self.call_function(Arc::clone(def), args).await,
                Value::Native(native) if function.is_callable() => globals::call(*native, &args),
                Value::HostMethod { object, method } => {
                    debug!(object = %object, method = %method, "host call");
                    self.host.call(object, method, args).await
                }
                _ => Err(ScriptError::Type(format!("{label} is not a function"))),
            }
        })
    }

    async fn call_function(&mut self, def: Arc<FunctionDef>, args: Vec<Value>) -> ScriptResult<Value> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::Range(
                "Maximum call stack size exceeded".to_string(),
            ));
        }

        let mut frame = Scope::default();
        for (i, param) in def.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Undefined);
            frame.bindings.insert(
                param.clone(),
                Binding {
                    value,
                    constant: false,
                },
            );
        }
        frame.bindings.insert(
            "arguments".to_string(),
            Binding {
                value: Value::Array(args),
                constant: false,
            },
        );

        self.depth += 1;
        self.scopes.push(frame);
        let result = self.exec_stmts(&def.body).await;
        self.scopes.pop();
        self.depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    async fn array_callback(
        &mut self,
        items: &[Value],
        name: &str,
        args: &[Value],
        label: &str,
    ) -> ScriptResult<Value> {
        let callback = args.first().cloned().unwrap_or(Value::Undefined);
        if !callback.is_callable() {
            return Err(ScriptError::Type(format!(
                "{callback} is not a function (in {label})"
            )));
        }

        if name == "reduce" {
            let mut rest = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match rest.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(ScriptError::Type(
                            "Reduce of empty array with no initial value".to_string(),
                        ))
                    }
                },
            };
            for (i, item) in rest {
                acc = self
                    .invoke(&callback, vec![acc, item.clone(), i.into()], label)
                    .await?;
            }
            return Ok(acc);
        }

        let mut mapped = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let result = self
                .invoke(&callback, vec![item.clone(), i.into()], label)
                .await?;
            match name {
                "map" => mapped.push(result),
                "flatMap" => match result {
                    Value::Array(inner) => mapped.extend(inner),
                    other => mapped.push(other),
                },
                "filter" => {
                    if result.truthy() {
                        mapped.push(item.clone());
                    }
                }
                "find" if result.truthy() => return Ok(item.clone()),
                "findIndex" if result.truthy() => return Ok(i.into()),
                "some" if result.truthy() => return Ok(Value::Bool(true)),
                "every" if !result.truthy() => return Ok(Value::Bool(false)),
                "findLast" if result.truthy() => mapped = vec![item.clone()],
                _ => {}
            }
        }

        Ok(match name {
            "map" | "flatMap" | "filter" => Value::Array(mapped),
            "find" => Value::Undefined,
            "findIndex" => Value::Number(-1.0),
            "some" => Value::Bool(false),
            "every" => Value::Bool(true),
            "findLast" => mapped.pop().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        })
    }

    /// Stable insertion sort with a script comparator.
    async fn sort_with(&mut self, mut items: Vec<Value>, comparator: &Value) -> ScriptResult<Vec<Value>> {
        for i in 1..items.len() {
            let mut j = i;
            while j > 0 {
                let order = self
                    .invoke(
                        comparator,
                        vec![items[j - 1].clone(), items[j].clone()],
                        "comparator",
                    )
                    .await?
                    .to_number();
                if order > 0.0 {
                    items.swap(j - 1, j);
                    j -= 1;
                } else {
                    break;
                }
            }
        }
        Ok(items)
    }

    // Places

    async fn place(&mut self, target: &Expr) -> ScriptResult<Place> {
        enum Step<'e> {
            Name(&'e str),
            Index(&'e Expr),
        }

        let mut steps = Vec::new();
        let mut cursor = target;
        let root = loop {
            match cursor {
                Expr::Ident(name) => break name.clone(),
                Expr::Member {
                    object, property, ..
                } => {
                    steps.push(Step::Name(property.as_str()));
                    cursor = &**object;
                }
                Expr::Index { object, index } => {
                    steps.push(Step::Index(&**index));
                    cursor = &**object;
                }
                _ => {
                    return Err(ScriptError::Syntax(
                        "Invalid left-hand side in assignment".to_string(),
                    ))
                }
            }
        };

        let mut keys = Vec::with_capacity(steps.len());
        for step in steps.into_iter().rev() {
            keys.push(match step {
                Step::Name(name) => name.to_string(),
                Step::Index(index) => self.eval(index).await?.to_string(),
            });
        }
        Ok(Place { root, keys })
    }

    fn read_place(&self, place: &Place) -> ScriptResult<Value> {
        let mut value = self.variable(&place.root)?;
        for key in &place.keys {
            value = self.member(&value, key)?;
        }
        Ok(value)
    }

    fn write_place(&mut self, place: &Place, value: Value) -> ScriptResult<()> {
        self.store(place, value, false)
    }

    /// Write `value` at `place`. `in_place` marks an update of the value a
    /// binding already holds, which `const` allows.
    fn store(&mut self, place: &Place, value: Value, in_place: bool) -> ScriptResult<()> {
        let Some(binding) = self.binding_mut(&place.root) else {
            return Err(ScriptError::Reference(format!(
                "{} is not defined",
                place.root
            )));
        };
        let Some((last, path)) = place.keys.split_last() else {
            if binding.constant && !in_place {
                return Err(ScriptError::Type(
                    "Assignment to constant variable.".to_string(),
                ));
            }
            binding.value = value;
            return Ok(());
        };

        let mut slot = &mut binding.value;
        for key in path {
            slot = child_mut(slot, key)?;
        }
        set_property(slot, last, value)
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

fn child_mut<'v>(target: &'v mut Value, key: &str) -> ScriptResult<&'v mut Value> {
    let missing = || ScriptError::Type(format!("Cannot set properties of undefined (setting '{key}')"));
    match target {
        Value::Object(map) => map.get_mut(key).ok_or_else(missing),
        Value::Array(items) => methods::array_index(key)
            .and_then(|i| items.get_mut(i))
            .ok_or_else(missing),
        _ => Err(missing()),
    }
}

fn set_property(target: &mut Value, key: &str, value: Value) -> ScriptResult<()> {
    match target {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
        }
        Value::Array(items) => {
            if key == "length" {
                resize_array(items, array_length(value.to_number())?)?;
            } else if let Some(i) = methods::array_index(key) {
                if i >= items.len() {
                    resize_array(items, i.saturating_add(1))?;
                }
                items[i] = value;
            }
        }
        Value::Undefined | Value::Null => {
            return Err(ScriptError::Type(format!(
                "Cannot set properties of {target} (setting '{key}')"
            )));
        }
        Value::Host(_) | Value::Native(_) => {
            return Err(ScriptError::Type(format!(
                "Cannot assign to read only property '{key}'"
            )));
        }
        _ => {}
    }
    Ok(())
}

fn iteration_items(value: Value, keys: bool) -> ScriptResult<Vec<Value>> {
    if keys {
        return Ok(match value {
            Value::Object(map) => map.into_keys().map(Value::String).collect(),
            Value::Array(items) => (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
            Value::String(s) => (0..s.chars().count())
                .map(|i| Value::String(i.to_string()))
                .collect(),
            _ => Vec::new(),
        });
    }
    match value {
        Value::Array(items) => Ok(items),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(ScriptError::Type(format!(
            "{} is not iterable",
            if matches!(other, Value::Object(_)) {
                "object".to_string()
            } else {
                other.to_string()
            }
        ))),
    }
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    let numbers = || (left.to_number(), right.to_number());
    Ok(match op {
        BinaryOp::Add => {
            let textual = |v: &Value| {
                matches!(
                    v,
                    Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Host(_)
                )
            };
            if textual(left) || textual(right) {
                let (left, right) = (left.to_string(), right.to_string());
                check_string_len(left.len() + right.len())?;
                Value::String(left + &right)
            } else {
                let (a, b) = numbers();
                Value::Number(a + b)
            }
        }
        BinaryOp::Sub => {
            let (a, b) = numbers();
            Value::Number(a - b)
        }
        BinaryOp::Mul => {
            let (a, b) = numbers();
            Value::Number(a * b)
        }
        BinaryOp::Div => {
            let (a, b) = numbers();
            Value::Number(a / b)
        }
        BinaryOp::Rem => {
            let (a, b) = numbers();
            Value::Number(a % b)
        }
        BinaryOp::Pow => {
            let (a, b) = numbers();
            Value::Number(a.powf(b))
        }
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let order = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => {
                    let (a, b) = numbers();
                    a.partial_cmp(&b)
                }
            };
            Value::Bool(order.is_some_and(|order| match op {
                BinaryOp::Lt => order.is_lt(),
                BinaryOp::LtEq => order.is_le(),
                BinaryOp::Gt => order.is_gt(),
                _ => order.is_ge(),
            }))
        }
        BinaryOp::In => {
            let key = left.to_string();
            match right {
                Value::Object(map) => Value::Bool(map.contains_key(&key)),
                Value::Array(items) => Value::Bool(
                    key == "length" || methods::array_index(&key).is_some_and(|i| i < items.len()),
                ),
                Value::Host(_) => Value::Bool(false),
                other => {
                    return Err(ScriptError::Type(format!(
                        "Cannot use 'in' operator to search for '{key}' in {other}"
                    )))
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::{run, HostObject};
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Host for RecordingHost {
        fn get(&self, object: &str, name: &str) -> Option<Value> {
            match (object, name) {
                ("", "args") => Some(Value::Array(vec!["a".into(), "b".into()])),
                ("", "fs") => Some(Value::Host(HostObject::new("fs"))),
                _ => None,
            }
        }

        fn has_method(&self, object: &str, name: &str) -> bool {
            matches!((object, name), ("", "writeln" | "exit") | ("fs", "read"))
        }

        async fn call(&self, object: &str, method: &str, args: Vec<Value>) -> ScriptResult<Value> {
            match (object, method) {
                ("", "writeln") => {
                    let line = args.first().map(ToString::to_string).unwrap_or_default();
                    self.lines.lock().unwrap().push(line);
                    Ok(Value::Undefined)
                }
                ("", "exit") => Err(ScriptError::Exit(
                    args.first().map_or(0, |v| v.to_integer() as i32),
                )),
                ("fs", "read") => Err(ScriptError::error(format!(
                    "{}: No such file or directory",
                    args.first().map(ToString::to_string).unwrap_or_default()
                ))),
                _ => Ok(Value::Undefined),
            }
        }
    }

    async fn eval_with_output(code: &str) -> (ScriptResult<Value>, Vec<String>) {
        let host = Arc::new(RecordingHost::default());
        let result = run(code, "t", host.clone()).await;
        let lines = host.lines.lock().unwrap().clone();
        (result, lines)
    }

    async fn eval(code: &str) -> Value {
        eval_with_output(code).await.0.unwrap()
    }

    #[tokio::test]
    async fn test_arithmetic_and_strings() {
        assert_eq!(eval("return 1 + 2 * 3;").await, Value::Number(7.0));
        assert_eq!(eval("return '1' + 2;").await, Value::from("12"));
        assert_eq!(eval("return 7 % 3 + 2 ** 3;").await, Value::Number(9.0));
        assert_eq!(eval("const n = 5; return `n=${n * 2}!`;").await, Value::from("n=10!"));
        assert_eq!(eval("return null ?? 'd';").await, Value::from("d"));
        assert_eq!(eval("return 0 || 'x';").await, Value::from("x"));
    }

    #[tokio::test]
    async fn test_host_access() {
        let (result, lines) = eval_with_output(
            r#"
            for (const a of t.args) { t.writeln(a.toUpperCase()); }
            const w = t.writeln;
            w(t.args.length);
            "#,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(lines, vec!["A", "B", "2"]);
    }

    #[tokio::test]
    async fn test_host_errors_are_catchable() {
        let (result, lines) = eval_with_output(
            r#"
            try {
                await t.fs.read('/nope');
            } catch (e) {
                t.writeln(e.message);
            } finally {
                t.writeln('done');
            }
            "#,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(lines, vec!["/nope: No such file or directory", "done"]);
    }

    #[tokio::test]
    async fn test_exit_is_not_catchable() {
        let (result, lines) = eval_with_output(
            "try { t.exit(3); } catch (e) { t.writeln('caught'); } finally { t.writeln('finally'); }",
        )
        .await;
        assert_eq!(result, Err(ScriptError::Exit(3)));
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_functions_and_callbacks() {
        let code = r#"
            function square(x) { return x * x; }
            const add = (a, b) => a + b;
            const nums = [1, 2, 3, 4];
            const result = nums.filter(n => n % 2 === 0).map(square).reduce(add, 0);
            return [result, nums.some(n => n > 3), nums.find(n => n > 1), nums.findIndex(n => n > 9)];
        "#;
        assert_eq!(
            eval(code).await,
            Value::Array(vec![20.into(), true.into(), 2.into(), (-1).into()])
        );
    }

    #[tokio::test]
    async fn test_hoisting() {
        assert_eq!(eval("return later(2); function later(x) { return x + 1; }").await, 3.into());
    }

    #[tokio::test]
    async fn test_mutating_methods_write_back() {
        let code = r#"
            const list = [3, 1, 2];
            list.push(4);
            list.sort();
            const o = { items: [] };
            o.items.push('x');
            const words = ['bb', 'a', 'ccc'];
            words.sort((a, b) => a.length - b.length);
            return [list, o.items, words];
        "#;
        assert_eq!(
            eval(code).await,
            Value::Array(vec![
                Value::Array(vec![1.into(), 2.into(), 3.into(), 4.into()]),
                Value::Array(vec!["x".into()]),
                Value::Array(vec!["a".into(), "bb".into(), "ccc".into()]),
            ])
        );
    }

    #[tokio::test]
    async fn test_const_array_mutates_in_place() {
        let code = "const list = [3, 1, 2]; list.push(4); list.reverse(); return list;";
        assert_eq!(
            eval(code).await,
            Value::Array(vec![4.into(), 2.into(), 1.into(), 3.into()])
        );
        let (result, _) = eval_with_output("const list = []; list = [1];").await;
        assert!(matches!(result, Err(ScriptError::Type(_))));
    }

    #[tokio::test]
    async fn test_oversized_values_are_range_errors() {
        let cases = [
            ("return 'ab'.repeat(1e18);", "Invalid string length"),
            ("return 'a'.padStart(1e18);", "Invalid string length"),
            ("return 'a'.padEnd(1e18, 'x');", "Invalid string length"),
            ("const x = []; x.length = 1e18;", "Invalid array length"),
            ("const x = [1]; x.length = -1;", "Invalid array length"),
            ("const x = []; x[1e15] = 1;", "Invalid array length"),
            ("return new Array(1e18);", "Invalid array length"),
            ("return Array(-1);", "Invalid array length"),
            ("return Array.from({ length: 1e18 });", "Invalid array length"),
        ];
        for (code, message) in cases {
            let (result, _) = eval_with_output(code).await;
            assert_eq!(result, Err(ScriptError::Range(message.to_string())), "{code}");
        }
    }

    #[tokio::test]
    async fn test_sizes_within_limits() {
        let code = r#"
            const a = new Array(3);
            const b = Array.from({ length: 2 });
            const c = [1, 2, 3];
            c.length = 1;
            c[2] = 'z';
            return [a.length, b.length, c, 'ab'.repeat(3), '7'.padStart(3, '0')];
        "#;
        assert_eq!(
            eval(code).await,
            Value::Array(vec![
                3.into(),
                2.into(),
                Value::Array(vec![1.into(), Value::Undefined, "z".into()]),
                "ababab".into(),
                "007".into(),
            ])
        );
    }

    #[tokio::test]
    async fn test_assignment_and_updates() {
        let code = r#"
            let o = { a: { b: 1 } };
            o.a.b += 4;
            o.a['c'] = 'k';
            let i = 0;
            const post = i++;
            const pre = ++i;
            const arr = [];
            arr[2] = 'z';
            return [o.a.b, o.a.c, post, pre, arr.length];
        "#;
        assert_eq!(
            eval(code).await,
            Value::Array(vec![5.into(), "k".into(), 0.into(), 2.into(), 3.into()])
        );
    }

    #[tokio::test]
    async fn test_const_reassignment() {
        let (result, _) = eval_with_output("const x = 1; x = 2;").await;
        assert_eq!(
            result,
            Err(ScriptError::Type("Assignment to constant variable.".to_string()))
        );
        // Properties of const objects stay mutable.
        assert_eq!(eval("const o = {}; o.k = 1; return o.k;").await, 1.into());
    }

    #[tokio::test]
    async fn test_destructuring_and_loops() {
        let code = r#"
            const { a, b: renamed } = { a: 1, b: 2 };
            const [first, , third] = [10, 20, 30];
            let keys = '';
            for (const k in { x: 1, y: 2 }) keys += k;
            let total = 0;
            for (let i = 0; i < 10; i++) {
                if (i === 2) continue;
                if (i === 5) break;
                total += i;
            }
            let n = 0;
            do { n++; } while (n < 3);
            return [a, renamed, first, third, keys, total, n];
        "#;
        assert_eq!(
            eval(code).await,
            Value::Array(vec![
                1.into(),
                2.into(),
                10.into(),
                30.into(),
                "xy".into(),
                8.into(),
                3.into()
            ])
        );
    }

    #[tokio::test]
    async fn test_no_ambient_capabilities() {
        assert_eq!(
            eval("return [typeof fetch, typeof process, typeof require, typeof Math];").await,
            Value::Array(vec![
                "undefined".into(),
                "undefined".into(),
                "undefined".into(),
                "object".into()
            ])
        );
        let (result, _) = eval_with_output("fetch('http://x');").await;
        assert_eq!(
            result,
            Err(ScriptError::Reference("fetch is not defined".to_string()))
        );
    }

    #[tokio::test]
    async fn test_call_depth_limit() {
        let program = super::super::parse_program(
            "function f(n) { return n > 0 ? f(n - 1) : 'bottom'; } return f(limit);",
        )
        .unwrap();

        let mut interp = Interpreter::new(Arc::new(RecordingHost::default())).with_max_depth(8);
        interp.bind("limit", 7.into());
        assert_eq!(interp.run(&program).await, Ok(Value::from("bottom")));

        let mut interp = Interpreter::new(Arc::new(RecordingHost::default())).with_max_depth(8);
        interp.bind("limit", 8.into());
        assert_eq!(
            interp.run(&program).await,
            Err(ScriptError::Range("Maximum call stack size exceeded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_uncaught_throw() {
        let (result, _) = eval_with_output("throw new Error('boom');").await;
        let err = result.unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "Uncaught boom");
    }

    #[tokio::test]
    async fn test_runtime_type_errors() {
        let (result, _) = eval_with_output("const x = undefined; x.y;").await;
        assert_eq!(
            result,
            Err(ScriptError::Type(
                "Cannot read properties of undefined (reading 'y')".to_string()
            ))
        );
        let (result, _) = eval_with_output("const x = 1; x();").await;
        assert_eq!(
            result,
            Err(ScriptError::Type("x is not a function".to_string()))
        );
        assert_eq!(eval("const u = undefined; return u?.y;").await, Value::Undefined);
    }
}
