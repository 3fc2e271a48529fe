//! Renderers turn code fragments into source text.
//!
//! Only Go is implemented; the fragments themselves carry no Go syntax.
use crate::code::{BinOp, Expr, FuncDecl, Param, Stmt, StructField, TypeDecl, TypeRef};
use crate::expr::{Literal, Primitive};

pub trait Render {
    fn type_ref(&self, ty: &TypeRef) -> String;
    fn expr(&self, expr: &Expr) -> String;
    fn block(&self, stmts: &[Stmt]) -> String;
    fn func(&self, func: &FuncDecl) -> String;
    fn type_decl(&self, decl: &TypeDecl) -> String;
}

/// Renders gofmt-shaped Go: tab indentation, one statement per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoRenderer;

impl Render for GoRenderer {
    fn type_ref(&self, ty: &TypeRef) -> String {
        self.type_ref_at(ty, 0)
    }

    fn expr(&self, expr: &Expr) -> String {
        self.expr_at(expr, 0)
    }

    fn block(&self, stmts: &[Stmt]) -> String {
        let mut out = String::new();
        self.stmts(stmts, 0, &mut out);
        out
    }

    fn func(&self, func: &FuncDecl) -> String {
        let mut out = String::new();
        doc_comment(func.doc.as_deref(), 0, &mut out);
        let params = func
            .params
            .iter()
            .map(|p| self.param(p))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("func {}({params})", func.name));
        match func.results.as_slice() {
            [] => {}
            [single] if single.name.is_none() => {
                out.push(' ');
                out.push_str(&self.type_ref(&single.ty));
            }
            results => {
                let rs = results.iter().map(|p| self.param(p)).collect::<Vec<_>>().join(", ");
                out.push_str(&format!(" ({rs})"));
            }
        }
        out.push_str(" {\n");
        self.stmts(&func.body, 1, &mut out);
        out.push_str("}\n");
        out
    }

    fn type_decl(&self, decl: &TypeDecl) -> String {
        let mut out = String::new();
        doc_comment(decl.doc.as_deref(), 0, &mut out);
        out.push_str(&format!("type {} {}\n", decl.name, self.type_ref_at(&decl.def, 0)));
        out
    }
}

impl GoRenderer {
    fn param(&self, p: &Param) -> String {
        match &p.name {
            Some(name) => format!("{name} {}", self.type_ref(&p.ty)),
            None => self.type_ref(&p.ty),
        }
    }

    fn type_ref_at(&self, ty: &TypeRef, indent: usize) -> String {
        match ty {
            TypeRef::Primitive(p) => primitive_name(*p).to_string(),
            TypeRef::Named { pkg: Some(pkg), name } => format!("{pkg}.{name}"),
            TypeRef::Named { pkg: None, name } => name.clone(),
            TypeRef::Pointer(inner) => format!("*{}", self.type_ref_at(inner, indent)),
            TypeRef::Slice(inner) => format!("[]{}", self.type_ref_at(inner, indent)),
            TypeRef::Map(k, v) => format!("map[{}]{}", self.type_ref_at(k, indent), self.type_ref_at(v, indent)),
            TypeRef::Struct(fields) => self.struct_def(fields, indent),
            TypeRef::Error => "error".to_string(),
        }
    }

    fn struct_def(&self, fields: &[StructField], indent: usize) -> String {
        if fields.is_empty() {
            return "struct {\n".to_string() + &tabs(indent) + "}";
        }
        let mut out = String::from("struct {\n");
        for f in fields {
            doc_comment(f.doc.as_deref(), indent + 1, &mut out);
            out.push_str(&format!("{}{} {}\n", tabs(indent + 1), f.name, self.type_ref_at(&f.ty, indent + 1)));
        }
        out.push_str(&tabs(indent));
        out.push('}');
        out
    }

    fn expr_at(&self, expr: &Expr, indent: usize) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Field(base, name) => format!("{}.{name}", self.expr_at(base, indent)),
            Expr::Index(base, idx) => format!("{}[{}]", self.expr_at(base, indent), self.expr_at(idx, indent)),
            Expr::Deref(inner) => format!("*{}", self.expr_at(inner, indent)),
            Expr::AddrOf(inner) => format!("&{}", self.expr_at(inner, indent)),
            Expr::Nil => "nil".to_string(),
            Expr::Lit(lit, ty) => self.literal(lit, ty),
            Expr::Str(s) => go_quote(s),
            Expr::Int(i) => i.to_string(),
            Expr::Call(func, args) => {
                let args = args.iter().map(|a| self.expr_at(a, indent)).collect::<Vec<_>>().join(", ");
                format!("{func}({args})")
            }
            Expr::Convert(ty, value) => {
                let ty_s = self.type_ref_at(ty, indent);
                let ty_s = if ty.is_pointer() { format!("({ty_s})") } else { ty_s };
                format!("{ty_s}({})", self.expr_at(value, indent))
            }
            Expr::Assert(value, ty) => format!("{}.({})", self.expr_at(value, indent), self.type_ref_at(ty, indent)),
            Expr::Composite { ty, fields, addr } => {
                let amp = if *addr { "&" } else { "" };
                let ty_s = self.type_ref_at(ty, indent);
                if fields.is_empty() {
                    return format!("{amp}{ty_s}{{}}");
                }
                let mut out = format!("{amp}{ty_s}{{\n");
                for (name, value) in fields {
                    out.push_str(&format!("{}{name}: {},\n", tabs(indent + 1), self.expr_at(value, indent + 1)));
                }
                out.push_str(&tabs(indent));
                out.push('}');
                out
            }
            Expr::SliceLit { elem, items } => {
                let items = items.iter().map(|e| self.expr_at(e, indent)).collect::<Vec<_>>().join(", ");
                format!("[]{}{{{items}}}", self.type_ref_at(elem, indent))
            }
            Expr::Make { ty, len } => format!("make({}, {})", self.type_ref_at(ty, indent), self.expr_at(len, indent)),
            Expr::Len(inner) => format!("len({})", self.expr_at(inner, indent)),
            Expr::Binary { op, lhs, rhs } => {
                let prec = precedence(*op);
                let l = self.operand(lhs, prec, indent);
                let r = self.operand(rhs, prec, indent);
                format!("{l} {} {r}", op_token(*op))
            }
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Binary { .. } => format!("!({})", self.expr_at(inner, indent)),
                other => format!("!{}", self.expr_at(other, indent)),
            },
        }
    }

    fn operand(&self, e: &Expr, parent: u8, indent: usize) -> String {
        match e {
            Expr::Binary { op, .. } if precedence(*op) < parent => format!("({})", self.expr_at(e, indent)),
            _ => self.expr_at(e, indent),
        }
    }

    fn literal(&self, lit: &Literal, ty: &TypeRef) -> String {
        match lit {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::UInt(u) => u.to_string(),
            Literal::Float(f) => {
                let s = f.0.to_string();
                if s.contains(['.', 'e', 'E']) || matches!(ty, TypeRef::Primitive(p) if !p.is_float()) {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            Literal::String(s) => go_quote(s),
            Literal::Array(items) => {
                let elem = match ty {
                    TypeRef::Slice(elem) => elem.as_ref().clone(),
                    _ => TypeRef::Primitive(Primitive::Any),
                };
                let items = items.iter().map(|l| self.literal(l, &elem)).collect::<Vec<_>>().join(", ");
                format!("{}{{{items}}}", self.type_ref(ty))
            }
        }
    }

    fn stmts(&self, stmts: &[Stmt], indent: usize, out: &mut String) {
        for stmt in stmts {
            self.stmt(stmt, indent, out);
        }
    }

    fn stmt(&self, stmt: &Stmt, indent: usize, out: &mut String) {
        let pad = tabs(indent);
        match stmt {
            Stmt::Assign { lhs, rhs, define } => {
                let op = if *define { ":=" } else { "=" };
                out.push_str(&format!("{pad}{} {op} {}\n", self.expr_at(lhs, indent), self.expr_at(rhs, indent)));
            }
            Stmt::VarDecl { name, ty, value } => {
                out.push_str(&format!("{pad}var {name} {}", self.type_ref_at(ty, indent)));
                if let Some(value) = value {
                    out.push_str(&format!(" = {}", self.expr_at(value, indent)));
                }
                out.push('\n');
            }
            Stmt::If { init, cond, then, otherwise } => {
                out.push_str(&pad);
                out.push_str("if ");
                if let Some(init) = init {
                    out.push_str(self.simple_stmt(init, indent).trim_end());
                    out.push_str("; ");
                }
                out.push_str(&format!("{} {{\n", self.expr_at(cond, indent)));
                self.stmts(then, indent + 1, out);
                if otherwise.is_empty() {
                    out.push_str(&format!("{pad}}}\n"));
                } else {
                    out.push_str(&format!("{pad}}} else {{\n"));
                    self.stmts(otherwise, indent + 1, out);
                    out.push_str(&format!("{pad}}}\n"));
                }
            }
            Stmt::Block(body) => {
                out.push_str(&format!("{pad}{{\n"));
                self.stmts(body, indent + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::Range { key, value, over, body } => {
                let over = self.expr_at(over, indent);
                let head = match (key, value) {
                    (Some(k), Some(v)) => format!("for {k}, {v} := range {over}"),
                    (Some(k), None) => format!("for {k} := range {over}"),
                    (None, Some(v)) => format!("for _, {v} := range {over}"),
                    (None, None) => format!("for range {over}"),
                };
                out.push_str(&format!("{pad}{head} {{\n"));
                self.stmts(body, indent + 1, out);
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::TypeSwitch { binding, subject, cases } => {
                out.push_str(&format!("{pad}switch {binding} := {}.(type) {{\n", self.expr_at(subject, indent)));
                for case in cases {
                    out.push_str(&format!("{pad}case {}:\n", self.type_ref_at(&case.ty, indent)));
                    self.stmts(&case.body, indent + 1, out);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::Switch { subject, cases, default } => {
                out.push_str(&format!("{pad}switch {} {{\n", self.expr_at(subject, indent)));
                for case in cases {
                    let values = case.values.iter().map(|v| self.expr_at(v, indent)).collect::<Vec<_>>().join(", ");
                    out.push_str(&format!("{pad}case {values}:\n"));
                    self.stmts(&case.body, indent + 1, out);
                }
                if !default.is_empty() {
                    out.push_str(&format!("{pad}default:\n"));
                    self.stmts(default, indent + 1, out);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            Stmt::Return(values) if values.is_empty() => out.push_str(&format!("{pad}return\n")),
            Stmt::Return(values) => {
                let values = values.iter().map(|v| self.expr_at(v, indent)).collect::<Vec<_>>().join(", ");
                out.push_str(&format!("{pad}return {values}\n"));
            }
            Stmt::Continue => out.push_str(&format!("{pad}continue\n")),
            Stmt::Expr(e) => out.push_str(&format!("{pad}{}\n", self.expr_at(e, indent))),
        }
    }

    // Init statement of an `if`, rendered without indentation.
    fn simple_stmt(&self, stmt: &Stmt, indent: usize) -> String {
        let mut out = String::new();
        self.stmt(stmt, 0, &mut out);
        // Composite literals inside the init must still line up with the `if`.
        if indent > 0 {
            out = out.replace('\n', &format!("\n{}", tabs(indent)));
        }
        out
    }
}

fn primitive_name(p: Primitive) -> &'static str {
    match p {
        Primitive::Boolean => "bool",
        Primitive::Int => "int",
        Primitive::Int32 => "int32",
        Primitive::Int64 => "int64",
        Primitive::UInt => "uint",
        Primitive::UInt32 => "uint32",
        Primitive::UInt64 => "uint64",
        Primitive::Float32 => "float32",
        Primitive::Float64 => "float64",
        Primitive::String => "string",
        Primitive::Bytes => "[]byte",
        Primitive::Any => "any",
    }
}

fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt => 3,
    }
}

fn op_token(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "||",
        BinOp::And => "&&",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
    }
}

fn tabs(n: usize) -> String {
    "\t".repeat(n)
}

fn doc_comment(doc: Option<&str>, indent: usize, out: &mut String) {
    if let Some(doc) = doc {
        for line in doc.lines() {
            out.push_str(&format!("{}// {line}\n", tabs(indent)));
        }
    }
}

/// Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ------------------------------- Tests ------------------------------------ //
