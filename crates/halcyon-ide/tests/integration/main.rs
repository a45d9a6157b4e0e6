//! Integration tests for halcyon-ide
//!
//! Programs are assembled with wasm-encoder and handed to the pipeline by a
//! table-driven stand-in compiler, so these tests need no Halcyon toolchain.
//! Tests that drive a real compiler process use `sh` and only run on unix.

use std::collections::HashMap;

use halcyon_ide::{CompileFailure, Config, Console, Pipeline, TextBuffer};
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, Instruction, MemoryType, Module, StartSection, TypeSection,
    ValType,
};

mod host_imports;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const TYPE_PRINT: u32 = 0;
const TYPE_VOID: u32 = 1;
const TYPE_RETURNS_I32: u32 = 2;

/// Function index of `print_string` in every program that imports it
pub(crate) const PRINT: u32 = 0;

/// Instructions that call `print_string(offset, length)`
pub(crate) fn print(offset: i64, length: i64) -> Vec<Instruction<'static>> {
    vec![
        Instruction::I64Const(offset),
        Instruction::I64Const(length),
        Instruction::Call(PRINT),
    ]
}

/// Builder for small test modules speaking the host ABI
pub(crate) struct Program {
    namespace: &'static str,
    memory: Option<MemoryType>,
    print_import: bool,
    extra_imports: Vec<&'static str>,
    data: Vec<(u32, Vec<u8>)>,
    start: Option<Vec<Instruction<'static>>>,
    exports: Vec<(&'static str, u32, Vec<Instruction<'static>>)>,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self {
            namespace: "sys",
            memory: Some(memory_type(1, None)),
            print_import: true,
            extra_imports: Vec::new(),
            data: Vec::new(),
            start: None,
            exports: Vec::new(),
        }
    }

    /// Program whose start function prints `text` in one call
    pub(crate) fn printing(text: &str) -> Self {
        Self::new()
            .data(0, text.as_bytes())
            .start(print(0, text.len() as i64))
    }

    pub(crate) fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = namespace;
        self
    }

    pub(crate) fn memory_pages(mut self, minimum: u64, maximum: Option<u64>) -> Self {
        self.memory = Some(memory_type(minimum, maximum));
        self
    }

    pub(crate) fn without_memory(mut self) -> Self {
        self.memory = None;
        self
    }

    pub(crate) fn without_print(mut self) -> Self {
        self.print_import = false;
        self
    }

    /// Import another `() -> ()` host function the sandbox does not provide
    pub(crate) fn import_function(mut self, name: &'static str) -> Self {
        self.extra_imports.push(name);
        self
    }

    pub(crate) fn data(mut self, offset: u32, bytes: &[u8]) -> Self {
        self.data.push((offset, bytes.to_vec()));
        self
    }

    pub(crate) fn start(mut self, body: Vec<Instruction<'static>>) -> Self {
        self.start = Some(body);
        self
    }

    /// Export a `() -> ()` function
    pub(crate) fn export(mut self, name: &'static str, body: Vec<Instruction<'static>>) -> Self {
        self.exports.push((name, TYPE_VOID, body));
        self
    }

    /// Export a `() -> i32` function returning zero
    pub(crate) fn export_returning_i32(mut self, name: &'static str) -> Self {
        self.exports
            .push((name, TYPE_RETURNS_I32, vec![Instruction::I32Const(0)]));
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut types = TypeSection::new();
        types
            .ty()
            .function([ValType::I64, ValType::I64], Vec::<ValType>::new());
        types
            .ty()
            .function(Vec::<ValType>::new(), Vec::<ValType>::new());
        types.ty().function(Vec::<ValType>::new(), [ValType::I32]);

        let mut imports = ImportSection::new();
        let mut imported_functions = 0;
        if self.print_import {
            imports.import(
                self.namespace,
                "print_string",
                EntityType::Function(TYPE_PRINT),
            );
            imported_functions += 1;
        }
        for name in &self.extra_imports {
            imports.import(self.namespace, name, EntityType::Function(TYPE_VOID));
            imported_functions += 1;
        }
        if let Some(memory) = self.memory {
            imports.import(self.namespace, "memory", EntityType::Memory(memory));
        }

        let mut functions = FunctionSection::new();
        let mut code = CodeSection::new();
        let mut exports = ExportSection::new();
        let mut next_index = imported_functions;

        let start_index = self.start.map(|body| {
            functions.function(TYPE_VOID);
            code.function(&function_body(body));
            next_index += 1;
            next_index - 1
        });
        for (name, ty, body) in self.exports {
            functions.function(ty);
            code.function(&function_body(body));
            exports.export(name, ExportKind::Func, next_index);
            next_index += 1;
        }

        let mut data = DataSection::new();
        for (offset, bytes) in &self.data {
            data.active(
                0,
                &ConstExpr::i32_const(*offset as i32),
                bytes.iter().copied(),
            );
        }

        let mut module = Module::new();
        module.section(&types);
        module.section(&imports);
        module.section(&functions);
        module.section(&exports);
        if let Some(function_index) = start_index {
            module.section(&StartSection { function_index });
        }
        module.section(&code);
        if !self.data.is_empty() {
            module.section(&data);
        }
        module.finish()
    }
}

fn memory_type(minimum: u64, maximum: Option<u64>) -> MemoryType {
    MemoryType {
        minimum,
        maximum,
        memory64: false,
        shared: false,
        page_size_log2: None,
    }
}

fn function_body(instructions: Vec<Instruction<'static>>) -> Function {
    let mut function = Function::new(Vec::new());
    for instruction in &instructions {
        function.instruction(instruction);
    }
    function.instruction(&Instruction::End);
    function
}

/// Stand-in compiler mapping exact source texts to prebuilt modules
///
/// Any other text fails with a two-line parse error.
pub(crate) fn table_compiler(
    programs: Vec<(&'static str, Vec<u8>)>,
) -> impl Fn(&str) -> Result<Vec<u8>, CompileFailure> + Send + 'static {
    let table: HashMap<String, Vec<u8>> = programs
        .into_iter()
        .map(|(source, bytes)| (source.to_owned(), bytes))
        .collect();
    move |source: &str| {
        table.get(source).cloned().ok_or_else(|| {
            CompileFailure::new("parse error: unexpected token\nat line 1, column 8\n")
        })
    }
}

/// Pipeline over a table compiler with the default config
pub(crate) fn pipeline(source: &str, programs: Vec<(&'static str, Vec<u8>)>) -> Pipeline {
    pipeline_with_config(&Config::default(), source, programs)
}

pub(crate) fn pipeline_with_config(
    config: &Config,
    source: &str,
    programs: Vec<(&'static str, Vec<u8>)>,
) -> Pipeline {
    Pipeline::with_compiler(
        config,
        table_compiler(programs),
        TextBuffer::new(source),
        Console::new(),
    )
}
