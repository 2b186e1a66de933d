//! Code-generation sink.
//!
//! Generators ([`ScalarMachine::generate_code`](crate::ScalarMachine::generate_code),
//! [`Graph::generate_code`](crate::Graph::generate_code)) never build source
//! text themselves beyond single statements: they ask a [`CodeSink`] for
//! storage (workspace, constant tables) and push body lines to it in order.
//! [`CodeGenerator`] is the default sink and emits C.
//!
//! Output is a pure function of what is emitted, so generating the same
//! machine twice yields byte-identical text.

/// Destination for generated code.
pub trait CodeSink {
    /// Floating-point type name.
    fn real_type(&self) -> &str;

    /// Integer type name for loop counters and positions.
    fn int_type(&self) -> &str;

    /// Add a file-scope declaration.
    fn declare(&mut self, decl: String);

    /// Append one statement to the function body at the current depth.
    fn emit(&mut self, line: String);

    /// Append `header {` and indent subsequent lines.
    fn open_block(&mut self, header: String);

    /// Close the innermost block.
    fn close_block(&mut self);

    /// Register a read-only table of reals; returns its name. Identical
    /// tables may share a name.
    fn constant_table(&mut self, values: &[f64]) -> String;

    /// Reserve a real workspace of at least `size` entries; returns its name.
    fn workspace(&mut self, size: usize) -> String;

    /// Name of the buffer holding input `i`.
    fn input(&self, i: usize) -> String {
        format!("arg[{i}]")
    }

    /// Name of the buffer receiving output `o`.
    fn output(&self, o: usize) -> String {
        format!("res[{o}]")
    }

    /// Source literal for `value`.
    fn literal(&self, value: f64) -> String {
        c_literal(value)
    }
}

/// C literal for a double: shortest round-trip decimal, or the `math.h`
/// macros for non-finite values.
pub fn c_literal(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INFINITY".to_string()
        } else {
            "-INFINITY".to_string()
        }
    } else {
        format!("{value:?}")
    }
}

/// Options for [`CodeGenerator`].
#[derive(Clone, Debug)]
pub struct CodegenOptions {
    /// Name of the generated function (default: `"eval"`).
    pub function_name: String,
    /// Floating-point type (default: `"double"`).
    pub real_type: String,
    /// Integer type (default: `"long long"`).
    pub int_type: String,
    /// Spaces per indentation level (default: 2).
    pub indent: usize,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            function_name: "eval".to_string(),
            real_type: "double".to_string(),
            int_type: "long long".to_string(),
            indent: 2,
        }
    }
}

/// Default C-flavoured sink.
///
/// [`finish`](CodeGenerator::finish) produces the `math.h` include, the
/// declarations, a function
/// `int <name>(const double** arg, double** res, long long* iw, double* w)`
/// returning `0`, and `int <name>_work(long long* sz_w)` reporting the
/// workspace size.
#[derive(Clone, Debug, Default)]
pub struct CodeGenerator {
    options: CodegenOptions,
    declarations: Vec<String>,
    body: Vec<String>,
    depth: usize,
    real_tables: Vec<(Vec<u64>, String)>,
    worksize: usize,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::with_options(CodegenOptions::default())
    }

    pub fn with_options(options: CodegenOptions) -> Self {
        CodeGenerator {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// Largest workspace requested so far.
    pub fn worksize(&self) -> usize {
        self.worksize
    }

    /// Assemble the translation unit.
    pub fn finish(&self) -> String {
        let o = &self.options;
        let pad = " ".repeat(o.indent);
        let mut src = String::from("#include <math.h>\n\n");
        for decl in &self.declarations {
            src.push_str(decl);
            src.push('\n');
        }
        if !self.declarations.is_empty() {
            src.push('\n');
        }
        src.push_str(&format!(
            "int {}(const {r}** arg, {r}** res, {i}* iw, {r}* w) {{\n",
            o.function_name,
            r = o.real_type,
            i = o.int_type
        ));
        for line in &self.body {
            src.push_str(&pad);
            src.push_str(line);
            src.push('\n');
        }
        src.push_str(&format!("{pad}return 0;\n}}\n\n"));
        src.push_str(&format!(
            "int {}_work({}* sz_w) {{\n{pad}if (sz_w) *sz_w = {};\n{pad}return 0;\n}}\n",
            o.function_name, o.int_type, self.worksize
        ));
        src
    }

    fn indented(&self, line: String) -> String {
        let mut s = " ".repeat(self.depth * self.options.indent);
        s.push_str(&line);
        s
    }
}

impl CodeSink for CodeGenerator {
    fn real_type(&self) -> &str {
        &self.options.real_type
    }

    fn int_type(&self) -> &str {
        &self.options.int_type
    }

    fn declare(&mut self, decl: String) {
        self.declarations.push(decl);
    }

    fn emit(&mut self, line: String) {
        let line = self.indented(line);
        self.body.push(line);
    }

    fn open_block(&mut self, header: String) {
        let line = self.indented(format!("{header} {{"));
        self.body.push(line);
        self.depth += 1;
    }

    fn close_block(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        let line = self.indented("}".to_string());
        self.body.push(line);
    }

    fn constant_table(&mut self, values: &[f64]) -> String {
        let key: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        if let Some((_, name)) = self.real_tables.iter().find(|(k, _)| *k == key) {
            return name.clone();
        }
        let name = format!("c{}", self.real_tables.len());
        let items: Vec<String> = values.iter().map(|&v| self.literal(v)).collect();
        self.declare(format!(
            "static const {} {name}[{}] = {{{}}};",
            self.options.real_type,
            values.len().max(1),
            items.join(", ")
        ));
        self.real_tables.push((key, name.clone()));
        name
    }

    fn workspace(&mut self, size: usize) -> String {
        self.worksize = self.worksize.max(size);
        "w".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_cover_non_finite() {
        assert_eq!(c_literal(1.0), "1.0");
        assert_eq!(c_literal(-0.5), "-0.5");
        assert_eq!(c_literal(f64::INFINITY), "INFINITY");
        assert_eq!(c_literal(f64::NEG_INFINITY), "-INFINITY");
        assert_eq!(c_literal(f64::NAN), "NAN");
    }

    #[test]
    fn identical_tables_are_shared() {
        let mut g = CodeGenerator::new();
        let a = g.constant_table(&[1.0, 2.0]);
        let b = g.constant_table(&[1.0, 2.0]);
        let c = g.constant_table(&[3.0]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(g.finish().matches("static const double").count(), 2);
    }

    #[test]
    fn blocks_indent_body() {
        let mut g = CodeGenerator::new();
        g.open_block("for (k=0; k<2; ++k)".to_string());
        g.emit("w[k] = 0;".to_string());
        g.close_block();
        let src = g.finish();
        assert!(src.contains("  for (k=0; k<2; ++k) {\n    w[k] = 0;\n  }\n"));
    }
}
