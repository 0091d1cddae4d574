//! The sandboxed evaluator: a tree-walking interpreter over the dialect AST.
//!
//! Evaluation is total. Parse failures, thrown values, and exhausted resource
//! limits all come back as data; nothing escapes to the embedder as a panic
//! or an error. The only binding visible to evaluated code is `console`.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::console::{Channel, Console};
use crate::dispatch::ExecutionResult;
use crate::format::format_value;
use crate::parser::{
    self, ArrowBody, AssignmentOperator, BinaryOperator, DeclarationKind, Expression, Literal,
    LogicalOperator, Spanned, Statement, UnaryOperator,
};
use crate::value::{
    AssignError, FunctionBody, FunctionValue, NativeFunction, Scope, ScopeRef, Value,
};

/// Resource guards for one evaluation. There is deliberately no wall-clock
/// timeout; the step budget bounds runaway loops instead.
#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    /// Evaluation steps before the run is aborted.
    pub fuel: u64,
    /// Maximum nested call depth.
    pub call_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            fuel: 100_000,
            call_depth: 256,
        }
    }
}

/// A pluggable script execution strategy. The dispatcher and the playground
/// controller only ever see this trait, so the concrete engine can be swapped
/// without touching either.
pub trait ExecutionBackend {
    fn evaluate(&self, source_code: &str) -> ExecutionResult;
}

/// The default backend: the tree-walking interpreter in this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeWalkBackend {
    pub limits: EvalLimits,
}

impl ExecutionBackend for TreeWalkBackend {
    fn evaluate(&self, source_code: &str) -> ExecutionResult {
        debug!(bytes = source_code.len(), "evaluating script source");
        let console = Console::new();
        match evaluate_source(source_code, &console, self.limits) {
            EvalOutcome::Completed { completion_value } => ExecutionResult::Success {
                entries: console.into_entries(),
                completion_value,
            },
            EvalOutcome::ParseFailed { message } => {
                debug!("script source failed to parse");
                ExecutionResult::Failure {
                    entries: Vec::new(),
                    message,
                }
            }
        }
    }
}

/// A stub backend for embeddings that must not run visitor scripts at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

impl ExecutionBackend for DisabledBackend {
    fn evaluate(&self, _source_code: &str) -> ExecutionResult {
        ExecutionResult::Failure {
            entries: Vec::new(),
            message: "script execution is disabled in this embedding".to_string(),
        }
    }
}

/// Outcome of evaluating one source string against an injected console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Evaluation ran to an end; diagnostics are in the console. A thrown
    /// value or an exhausted limit still counts as `Completed` - user-code
    /// trouble is output, not an engine failure.
    Completed { completion_value: Option<String> },
    /// The source never became executable.
    ParseFailed { message: String },
}

/// Evaluates one snippet with the given console as its only injected binding.
///
/// The whole program is treated as an implicit function body, so top-level
/// `return` is legal and produces the completion value.
pub fn evaluate_source(source_code: &str, console: &Console, limits: EvalLimits) -> EvalOutcome {
    let ast = match parser::parse(parser::SNIPPET_FILENAME, source_code) {
        Ok(ast) => ast,
        Err(failure) => {
            return EvalOutcome::ParseFailed {
                message: failure.message,
            };
        }
    };

    let globals = Scope::root();
    install_console(&globals, console);

    let mut interpreter = Interpreter {
        limits,
        fuel: limits.fuel,
        depth: 0,
    };

    let completion = match interpreter.execute_statements(&ast, &globals) {
        Ok(Flow::Return(value)) => Some(value),
        Ok(Flow::Normal) => None,
        Err(Interrupt::Thrown(value)) => {
            console.error(&[value]);
            None
        }
        Err(Interrupt::FuelExhausted) => {
            debug!(fuel = limits.fuel, "evaluation step budget exhausted");
            console.entry(
                Channel::Error,
                format!(
                    "ERROR: evaluation step budget of {} exhausted; run aborted",
                    limits.fuel
                ),
            );
            None
        }
        Err(Interrupt::DepthExceeded) => {
            debug!(depth = limits.call_depth, "call depth limit exceeded");
            console.entry(
                Channel::Error,
                format!(
                    "ERROR: call depth limit of {} exceeded; run aborted",
                    limits.call_depth
                ),
            );
            None
        }
    };

    let completion_value = match completion {
        None | Some(Value::Undefined) => None,
        Some(value) => {
            let formatted = format_value(&value);
            console.entry(Channel::Log, format!("Return value: {formatted}"));
            Some(formatted)
        }
    };
    EvalOutcome::Completed { completion_value }
}

/// The `console` object is the single capability handed to evaluated code.
fn install_console<'a>(globals: &ScopeRef<'a>, console: &'a Console) {
    fn native<'a>(
        name: &'static str,
        func: impl Fn(&[Value<'a>]) -> Value<'a> + 'a,
    ) -> Value<'a> {
        Value::Native(Rc::new(NativeFunction {
            name,
            func: Box::new(func),
        }))
    }

    let mut members: IndexMap<String, Value<'a>> = IndexMap::new();
    members.insert(
        "log".to_string(),
        native("log", move |values: &[Value<'a>]| {
            console.log(values);
            Value::Undefined
        }),
    );
    members.insert(
        "info".to_string(),
        native("info", move |values: &[Value<'a>]| {
            console.info(values);
            Value::Undefined
        }),
    );
    members.insert(
        "warn".to_string(),
        native("warn", move |values: &[Value<'a>]| {
            console.warn(values);
            Value::Undefined
        }),
    );
    members.insert(
        "error".to_string(),
        native("error", move |values: &[Value<'a>]| {
            console.error(values);
            Value::Undefined
        }),
    );

    globals.borrow_mut().declare(
        "console",
        Value::Object(Rc::new(RefCell::new(members))),
        true,
    );
}

enum Interrupt<'a> {
    Thrown(Value<'a>),
    FuelExhausted,
    DepthExceeded,
}

type Eval<'a, T> = Result<T, Interrupt<'a>>;

fn thrown<'a, T>(name: &str, message: String) -> Eval<'a, T> {
    Err(Interrupt::Thrown(Value::error(name, message)))
}

enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

struct Interpreter {
    limits: EvalLimits,
    fuel: u64,
    depth: usize,
}

impl Interpreter {
    fn step<'a>(&mut self) -> Eval<'a, ()> {
        if self.fuel == 0 {
            return Err(Interrupt::FuelExhausted);
        }
        self.fuel -= 1;
        Ok(())
    }

    fn execute_statements<'a>(
        &mut self,
        statements: &'a [Spanned<Statement<'a>>],
        scope: &ScopeRef<'a>,
    ) -> Eval<'a, Flow<'a>> {
        for statement in statements {
            if let Flow::Return(value) = self.execute_statement(statement, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_statement<'a>(
        &mut self,
        statement: &'a Spanned<Statement<'a>>,
        scope: &ScopeRef<'a>,
    ) -> Eval<'a, Flow<'a>> {
        self.step()?;
        match &statement.node {
            Statement::Declaration {
                kind,
                name,
                initializer,
            } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate_expression(initializer, scope)?,
                    None => Value::Undefined,
                };
                scope
                    .borrow_mut()
                    .declare(*name, value, *kind == DeclarationKind::Const);
                Ok(Flow::Normal)
            }
            Statement::Function {
                name,
                parameters,
                body,
            } => {
                let function = Value::Function(Rc::new(FunctionValue {
                    name: Some(*name),
                    parameters,
                    body: FunctionBody::Block(body),
                    env: scope.clone(),
                }));
                scope.borrow_mut().declare(*name, function, false);
                Ok(Flow::Normal)
            }
            Statement::Expression(expression) => {
                self.evaluate_expression(expression, scope)?;
                Ok(Flow::Normal)
            }
            Statement::Return(expression) => {
                let value = match expression {
                    Some(expression) => self.evaluate_expression(expression, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::Throw(expression) => {
                let value = self.evaluate_expression(expression, scope)?;
                Err(Interrupt::Thrown(value))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expression(condition, scope)?.is_truthy() {
                    let inner = Scope::child(scope.clone());
                    self.execute_statements(then_branch, &inner)
                } else if let Some(else_branch) = else_branch {
                    self.execute_statement(else_branch, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate_expression(condition, scope)?.is_truthy() {
                    self.step()?;
                    let inner = Scope::child(scope.clone());
                    if let Flow::Return(value) = self.execute_statements(body, &inner)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Try {
                body,
                catch_binding,
                catch_body,
            } => {
                let inner = Scope::child(scope.clone());
                match self.execute_statements(body, &inner) {
                    Err(Interrupt::Thrown(value)) => {
                        let handler = Scope::child(scope.clone());
                        if let Some(binding) = catch_binding {
                            handler.borrow_mut().declare(*binding, value, false);
                        }
                        self.execute_statements(catch_body, &handler)
                    }
                    // Exhausted limits are not catchable from inside the sandbox.
                    other => other,
                }
            }
            Statement::Block(statements) => {
                let inner = Scope::child(scope.clone());
                self.execute_statements(statements, &inner)
            }
        }
    }

    fn evaluate_expression<'a>(
        &mut self,
        expression: &'a Spanned<Expression<'a>>,
        scope: &ScopeRef<'a>,
    ) -> Eval<'a, Value<'a>> {
        self.step()?;
        match &expression.node {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(number) => Value::Number(*number),
                Literal::Text(text) => Value::text(text),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expression::Identifier(name) => match scope.borrow().get(name) {
                Some(value) => Ok(value),
                None => thrown("ReferenceError", format!("{name} is not defined")),
            },
            Expression::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate_expression(item, scope)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            Expression::Object(properties) => {
                let mut members = IndexMap::with_capacity(properties.len());
                for property in properties {
                    let value = self.evaluate_expression(&property.value, scope)?;
                    members.insert(property.key.as_str().to_string(), value);
                }
                Ok(Value::Object(Rc::new(RefCell::new(members))))
            }
            Expression::Function {
                name,
                parameters,
                body,
            } => Ok(Value::Function(Rc::new(FunctionValue {
                name: *name,
                parameters,
                body: FunctionBody::Block(body),
                env: scope.clone(),
            }))),
            Expression::Arrow { parameters, body } => {
                let body = match body {
                    ArrowBody::Block(statements) => FunctionBody::Block(statements),
                    ArrowBody::Expression(expression) => FunctionBody::Expression(&**expression),
                };
                Ok(Value::Function(Rc::new(FunctionValue {
                    name: None,
                    parameters,
                    body,
                    env: scope.clone(),
                })))
            }
            Expression::Member { object, property } => {
                let object = self.evaluate_expression(object, scope)?;
                self.get_member(&object, property)
            }
            Expression::Index { object, index } => {
                let object = self.evaluate_expression(object, scope)?;
                let index = self.evaluate_expression(index, scope)?;
                self.get_index(&object, &index)
            }
            Expression::Call { callee, arguments } => {
                let mut evaluated: SmallVec<[Value<'a>; 4]> = SmallVec::new();
                if let Expression::Member { object, property } = &callee.node {
                    let receiver = self.evaluate_expression(object, scope)?;
                    for argument in arguments {
                        evaluated.push(self.evaluate_expression(argument, scope)?);
                    }
                    self.call_method(&receiver, property, &evaluated)
                } else {
                    let callee = self.evaluate_expression(callee, scope)?;
                    for argument in arguments {
                        evaluated.push(self.evaluate_expression(argument, scope)?);
                    }
                    self.call_value(&callee, &evaluated)
                }
            }
            Expression::New {
                constructor,
                arguments,
            } => {
                let mut evaluated: SmallVec<[Value<'a>; 4]> = SmallVec::new();
                for argument in arguments {
                    evaluated.push(self.evaluate_expression(argument, scope)?);
                }
                match *constructor {
                    "Error" | "TypeError" | "RangeError" => {
                        let message = evaluated
                            .first()
                            .map(|value| value.display_string())
                            .unwrap_or_default();
                        Ok(Value::error(*constructor, message))
                    }
                    other => thrown("TypeError", format!("{other} is not a constructor")),
                }
            }
            Expression::Unary { operator, operand } => {
                let value = self.evaluate_expression(operand, scope)?;
                Ok(match operator {
                    UnaryOperator::Not => Value::Bool(!value.is_truthy()),
                    UnaryOperator::Negate => Value::Number(-value.to_number()),
                    UnaryOperator::Typeof => Value::text(value.type_name()),
                })
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate_expression(left, scope)?;
                let right = self.evaluate_expression(right, scope)?;
                Ok(binary_operation(*operator, &left, &right))
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate_expression(left, scope)?;
                match operator {
                    LogicalOperator::And if !left.is_truthy() => Ok(left),
                    LogicalOperator::Or if left.is_truthy() => Ok(left),
                    _ => self.evaluate_expression(right, scope),
                }
            }
            Expression::Conditional {
                condition,
                consequent,
                alternate,
            } => {
                if self.evaluate_expression(condition, scope)?.is_truthy() {
                    self.evaluate_expression(consequent, scope)
                } else {
                    self.evaluate_expression(alternate, scope)
                }
            }
            Expression::Assignment {
                operator,
                target,
                value,
            } => {
                let value = self.evaluate_expression(value, scope)?;
                self.assign(target, *operator, value, scope)
            }
        }
    }

    fn get_member<'a>(&mut self, object: &Value<'a>, property: &str) -> Eval<'a, Value<'a>> {
        match object {
            Value::Undefined | Value::Null => thrown(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{property}')",
                    object.display_string()
                ),
            ),
            Value::Object(members) => Ok(members
                .borrow()
                .get(property)
                .cloned()
                .unwrap_or(Value::Undefined)),
            Value::Array(items) => match property {
                "length" => Ok(Value::Number(items.borrow().len() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::Text(text) => match property {
                "length" => Ok(Value::Number(text.chars().count() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::Error(error) => match property {
                "name" => Ok(Value::text(&error.name)),
                "message" => Ok(Value::text(&error.message)),
                _ => Ok(Value::Undefined),
            },
            _ => Ok(Value::Undefined),
        }
    }

    fn get_index<'a>(&mut self, object: &Value<'a>, index: &Value<'a>) -> Eval<'a, Value<'a>> {
        match (object, index) {
            (Value::Array(items), Value::Number(number)) => {
                let items = items.borrow();
                Ok(index_of(*number, items.len())
                    .and_then(|position| items.get(position).cloned())
                    .unwrap_or(Value::Undefined))
            }
            (Value::Text(text), Value::Number(number)) => {
                Ok(index_of(*number, text.chars().count())
                    .and_then(|position| text.chars().nth(position))
                    .map(|character| Value::text(character.to_string()))
                    .unwrap_or(Value::Undefined))
            }
            (Value::Object(members), key) => {
                let key = key.display_string();
                Ok(members
                    .borrow()
                    .get(&key)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            }
            (Value::Undefined | Value::Null, _) => thrown(
                "TypeError",
                format!("Cannot read properties of {}", object.display_string()),
            ),
            _ => Ok(Value::Undefined),
        }
    }

    fn call_method<'a>(
        &mut self,
        receiver: &Value<'a>,
        method: &str,
        arguments: &[Value<'a>],
    ) -> Eval<'a, Value<'a>> {
        if let Value::Object(members) = receiver {
            let member = members.borrow().get(method).cloned();
            if let Some(member) = member {
                return self.call_value(&member, arguments);
            }
        }
        if let Some(result) = builtin_method(receiver, method, arguments) {
            return result;
        }
        thrown("TypeError", format!("{method} is not a function"))
    }

    fn call_value<'a>(&mut self, callee: &Value<'a>, arguments: &[Value<'a>]) -> Eval<'a, Value<'a>> {
        match callee {
            Value::Native(native) => Ok((native.func)(arguments)),
            Value::Function(function) => {
                if self.depth >= self.limits.call_depth {
                    return Err(Interrupt::DepthExceeded);
                }
                self.depth += 1;
                let result = self.call_function(function, arguments);
                self.depth -= 1;
                result
            }
            other => thrown(
                "TypeError",
                format!("{} is not a function", other.display_string()),
            ),
        }
    }

    fn call_function<'a>(
        &mut self,
        function: &Rc<FunctionValue<'a>>,
        arguments: &[Value<'a>],
    ) -> Eval<'a, Value<'a>> {
        let scope = Scope::child(function.env.clone());
        {
            let mut frame = scope.borrow_mut();
            // A named function can call itself even when the surrounding
            // binding was shadowed.
            if let Some(name) = function.name {
                frame.declare(name, Value::Function(function.clone()), false);
            }
            for (position, parameter) in function.parameters.iter().enumerate() {
                frame.declare(
                    parameter.name,
                    arguments.get(position).cloned().unwrap_or(Value::Undefined),
                    false,
                );
            }
        }
        match function.body {
            FunctionBody::Block(statements) => {
                match self.execute_statements(statements, &scope)? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Undefined),
                }
            }
            FunctionBody::Expression(expression) => self.evaluate_expression(expression, &scope),
        }
    }

    fn assign<'a>(
        &mut self,
        target: &'a Spanned<Expression<'a>>,
        operator: AssignmentOperator,
        value: Value<'a>,
        scope: &ScopeRef<'a>,
    ) -> Eval<'a, Value<'a>> {
        match &target.node {
            Expression::Identifier(name) => {
                let value = match operator {
                    AssignmentOperator::Assign => value,
                    compound => {
                        let Some(current) = scope.borrow().get(name) else {
                            return thrown("ReferenceError", format!("{name} is not defined"));
                        };
                        apply_compound(compound, &current, &value)
                    }
                };
                match scope.borrow_mut().assign(name, value.clone()) {
                    Ok(()) => Ok(value),
                    Err(AssignError::Constant) => thrown(
                        "TypeError",
                        "Assignment to constant variable.".to_string(),
                    ),
                    Err(AssignError::NotFound) => {
                        thrown("ReferenceError", format!("{name} is not defined"))
                    }
                }
            }
            Expression::Member { object, property } => {
                let receiver = self.evaluate_expression(object, scope)?;
                match &receiver {
                    Value::Object(members) => {
                        let value = match operator {
                            AssignmentOperator::Assign => value,
                            compound => {
                                let current = members
                                    .borrow()
                                    .get(*property)
                                    .cloned()
                                    .unwrap_or(Value::Undefined);
                                apply_compound(compound, &current, &value)
                            }
                        };
                        members
                            .borrow_mut()
                            .insert((*property).to_string(), value.clone());
                        Ok(value)
                    }
                    Value::Undefined | Value::Null => thrown(
                        "TypeError",
                        format!("Cannot set properties of {}", receiver.display_string()),
                    ),
                    other => thrown(
                        "TypeError",
                        format!("cannot assign property '{property}' on a {}", other.type_name()),
                    ),
                }
            }
            Expression::Index { object, index } => {
                let receiver = self.evaluate_expression(object, scope)?;
                let key = self.evaluate_expression(index, scope)?;
                match &receiver {
                    Value::Array(items) => {
                        let number = key.to_number();
                        if number.fract() != 0.0 || number < 0.0 {
                            return thrown(
                                "RangeError",
                                format!("invalid array index {}", key.display_string()),
                            );
                        }
                        let position = number as usize;
                        let value = match operator {
                            AssignmentOperator::Assign => value,
                            compound => {
                                let current = items
                                    .borrow()
                                    .get(position)
                                    .cloned()
                                    .unwrap_or(Value::Undefined);
                                apply_compound(compound, &current, &value)
                            }
                        };
                        let mut items = items.borrow_mut();
                        if position >= items.len() {
                            items.resize(position + 1, Value::Undefined);
                        }
                        items[position] = value.clone();
                        Ok(value)
                    }
                    Value::Object(members) => {
                        let key = key.display_string();
                        let value = match operator {
                            AssignmentOperator::Assign => value,
                            compound => {
                                let current = members
                                    .borrow()
                                    .get(&key)
                                    .cloned()
                                    .unwrap_or(Value::Undefined);
                                apply_compound(compound, &current, &value)
                            }
                        };
                        members.borrow_mut().insert(key, value.clone());
                        Ok(value)
                    }
                    other => thrown(
                        "TypeError",
                        format!("cannot assign into a {}", other.type_name()),
                    ),
                }
            }
            _ => thrown("SyntaxError", "invalid assignment target".to_string()),
        }
    }
}

fn builtin_method<'a>(
    receiver: &Value<'a>,
    method: &str,
    arguments: &[Value<'a>],
) -> Option<Eval<'a, Value<'a>>> {
    match receiver {
        Value::Array(items) => match method {
            "push" => {
                let mut items = items.borrow_mut();
                items.extend(arguments.iter().cloned());
                Some(Ok(Value::Number(items.len() as f64)))
            }
            "pop" => Some(Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined))),
            "join" => {
                let separator = arguments
                    .first()
                    .map(|value| value.display_string())
                    .unwrap_or_else(|| ",".to_string());
                let joined = items
                    .borrow()
                    .iter()
                    .map(|item| match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.display_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(&separator);
                Some(Ok(Value::text(joined)))
            }
            _ => None,
        },
        Value::Text(text) => match method {
            "toUpperCase" => Some(Ok(Value::text(text.to_uppercase()))),
            "toLowerCase" => Some(Ok(Value::text(text.to_lowercase()))),
            _ => None,
        },
        _ => None,
    }
}

fn binary_operation<'a>(
    operator: BinaryOperator,
    left: &Value<'a>,
    right: &Value<'a>,
) -> Value<'a> {
    use BinaryOperator::*;
    match operator {
        // `+` concatenates as soon as either operand is text.
        Add => {
            if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                Value::text(format!(
                    "{}{}",
                    left.display_string(),
                    right.display_string()
                ))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        Subtract => Value::Number(left.to_number() - right.to_number()),
        Multiply => Value::Number(left.to_number() * right.to_number()),
        Divide => Value::Number(left.to_number() / right.to_number()),
        Remainder => Value::Number(left.to_number() % right.to_number()),
        Less | LessOrEqual | Greater | GreaterOrEqual => Value::Bool(compare(operator, left, right)),
        Equal => Value::Bool(left.loose_equals(right)),
        NotEqual => Value::Bool(!left.loose_equals(right)),
        StrictEqual => Value::Bool(left.strict_equals(right)),
        StrictNotEqual => Value::Bool(!left.strict_equals(right)),
    }
}

fn compare(operator: BinaryOperator, left: &Value<'_>, right: &Value<'_>) -> bool {
    // Text compares lexicographically; everything else numerically.
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return match operator {
            BinaryOperator::Less => a < b,
            BinaryOperator::LessOrEqual => a <= b,
            BinaryOperator::Greater => a > b,
            BinaryOperator::GreaterOrEqual => a >= b,
            _ => false,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match operator {
        BinaryOperator::Less => a < b,
        BinaryOperator::LessOrEqual => a <= b,
        BinaryOperator::Greater => a > b,
        BinaryOperator::GreaterOrEqual => a >= b,
        _ => false,
    }
}

fn apply_compound<'a>(
    operator: AssignmentOperator,
    current: &Value<'a>,
    value: &Value<'a>,
) -> Value<'a> {
    match operator {
        AssignmentOperator::Assign => value.clone(),
        AssignmentOperator::AddAssign => binary_operation(BinaryOperator::Add, current, value),
        AssignmentOperator::SubtractAssign => {
            binary_operation(BinaryOperator::Subtract, current, value)
        }
    }
}

fn index_of(number: f64, len: usize) -> Option<usize> {
    if number.fract() != 0.0 || number < 0.0 {
        return None;
    }
    let index = number as usize;
    (index < len).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Channel;

    fn run(source: &str) -> ExecutionResult {
        TreeWalkBackend::default().evaluate(source)
    }

    fn success_entries(result: &ExecutionResult) -> &[crate::console::CaptureEntry] {
        match result {
            ExecutionResult::Success { entries, .. } => entries,
            ExecutionResult::Failure { message, .. } => {
                panic!("expected success, got failure: {message}")
            }
        }
    }

    #[test]
    fn hello_world_produces_exactly_one_entry() {
        let result = run(r#"console.log("Hello, " + "World!")"#);
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, Channel::Log);
        assert_eq!(entries[0].text, "Hello, World!");
    }

    #[test]
    fn top_level_return_becomes_the_completion_value() {
        let result = run("return 2 + 2;");
        let ExecutionResult::Success {
            entries,
            completion_value,
        } = result
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("4"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Return value: 4");
    }

    #[test]
    fn thrown_errors_surface_as_diagnostics_not_failures() {
        let result = run(r#"throw new Error("boom")"#);
        let ExecutionResult::Success {
            entries,
            completion_value,
        } = result
        else {
            panic!("user-code errors must not be dispatcher failures");
        };
        assert_eq!(completion_value, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, Channel::Error);
        assert!(entries[0].text.contains("boom"));
    }

    #[test]
    fn a_throw_adds_exactly_one_entry_after_earlier_output() {
        let result = run("console.log(1)\nconsole.log(2)\nthrow new Error(\"late\")");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].channel, Channel::Error);
    }

    #[test]
    fn malformed_source_is_a_failure_with_empty_entries() {
        let result = run("function( {");
        let ExecutionResult::Failure { entries, message } = result else {
            panic!("expected failure");
        };
        assert!(entries.is_empty());
        assert!(!message.is_empty());
    }

    #[test]
    fn functions_close_over_their_environment() {
        let source = r#"
function greet(name) {
  return "Hello, " + name + "!";
}

const message = greet("Developer");
console.log(message);
"#;
        let result = run(source);
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Hello, Developer!");
    }

    #[test]
    fn typed_annotations_do_not_change_execution() {
        let result = run("let x: number = 2; return x + 2;");
        let ExecutionResult::Success {
            completion_value, ..
        } = result
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("4"));
    }

    #[test]
    fn while_loops_and_compound_assignment_run() {
        let source = "let total = 0\nlet i = 0\nwhile (i < 4) {\n  total += i\n  i += 1\n}\nreturn total";
        let ExecutionResult::Success {
            completion_value, ..
        } = run(source)
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("6"));
    }

    #[test]
    fn try_catch_recovers_and_exposes_the_error() {
        let source = r#"
try {
  throw new Error("inner")
} catch (error) {
  console.log(error.message)
}
console.log("after")
"#;
        let entries_owner = run(source);
        let entries = success_entries(&entries_owner);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "inner");
        assert_eq!(entries[1].text, "after");
    }

    #[test]
    fn infinite_loops_hit_the_step_budget() {
        let result = run("while (true) {}");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, Channel::Error);
        assert!(entries[0].text.contains("step budget"));
    }

    #[test]
    fn unbounded_recursion_hits_the_depth_limit() {
        let result = run("function f() { return f(); }\nf()");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, Channel::Error);
        assert!(entries[0].text.contains("call depth"));
    }

    #[test]
    fn depth_limit_is_not_catchable_inside_the_sandbox() {
        let result = run("function f() { return f(); }\ntry { f() } catch (e) { console.log(\"caught\") }");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.contains("call depth"));
    }

    #[test]
    fn const_reassignment_is_a_type_error() {
        let result = run("const x = 1\nx = 2");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.contains("constant"));
    }

    #[test]
    fn unknown_identifiers_are_reference_errors() {
        let result = run("Math.floor(1.5)");
        let entries = success_entries(&result);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, Channel::Error);
        assert!(entries[0].text.contains("Math is not defined"));
    }

    #[test]
    fn console_is_the_only_injected_binding() {
        for global in ["window", "document", "globalThis", "fetch", "localStorage"] {
            let result = run(&format!("{global}"));
            let entries = success_entries(&result);
            assert!(
                entries[0].text.contains("is not defined"),
                "{global} leaked into the sandbox"
            );
        }
    }

    #[test]
    fn arrays_support_push_join_length_and_indexing() {
        let source = r#"
const items = ["a", "b"]
items.push("c")
console.log(items.length, items[0], items.join("-"))
"#;
        let result = run(source);
        let entries = success_entries(&result);
        assert_eq!(entries[0].text, "3 a a-b-c");
    }

    #[test]
    fn explicit_undefined_return_yields_no_completion_entry() {
        let result = run("return undefined");
        let ExecutionResult::Success {
            entries,
            completion_value,
        } = result
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value, None);
        assert!(entries.is_empty());
    }

    #[test]
    fn logical_operators_return_their_operands() {
        let ExecutionResult::Success {
            completion_value, ..
        } = run(r#"return 0 || "fallback""#)
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("fallback"));
    }

    #[test]
    fn cyclic_objects_log_without_hanging() {
        let source = r#"
const node = { n: 1 }
node.me = node
console.log(node)
"#;
        let result = run(source);
        let entries = success_entries(&result);
        assert_eq!(entries[0].text, "[object Object]");
    }

    #[test]
    fn arrow_functions_capture_and_run() {
        let source = "const double = x => x * 2\nconst add = (a, b) => { return a + b; }\nreturn add(double(3), 4)";
        let ExecutionResult::Success {
            completion_value, ..
        } = run(source)
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("10"));
    }

    #[test]
    fn string_methods_work() {
        let ExecutionResult::Success {
            completion_value, ..
        } = run(r#"return "MiXeD".toLowerCase().toUpperCase()"#)
        else {
            panic!("expected success");
        };
        assert_eq!(completion_value.as_deref(), Some("MIXED"));
    }

    #[test]
    fn objects_log_as_pretty_json() {
        let result = run(r#"console.log({ language: "script", ready: true })"#);
        let entries = success_entries(&result);
        assert!(entries[0].text.contains("\"language\": \"script\""));
        assert!(entries[0].text.contains("\"ready\": true"));
    }

    #[test]
    fn nested_synchronous_calls_keep_emission_order() {
        let source = r#"
function around(callback) {
  console.log("before");
  callback();
  console.log("after");
}
around(() => console.warn("inside"));
"#;
        let result = run(source);
        let entries = success_entries(&result);
        let texts: Vec<_> = entries.iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(texts, vec!["before", "WARN: inside", "after"]);
    }

    #[test]
    fn disabled_backend_refuses_evaluation() {
        let result = DisabledBackend.evaluate("console.log(1)");
        assert!(matches!(result, ExecutionResult::Failure { .. }));
    }

    #[test]
    fn fresh_console_per_run_means_no_cross_run_leakage() {
        let backend = TreeWalkBackend::default();
        let first = backend.evaluate("console.log(\"one\")");
        let second = backend.evaluate("console.log(\"two\")");
        assert_eq!(success_entries(&first).len(), 1);
        assert_eq!(success_entries(&second).len(), 1);
        assert_eq!(success_entries(&second)[0].text, "two");
    }
}
