//! End-to-end tests for the compiler's binary output.

use sexpr2wasm_compile::{compile, Compile, Error};

const ADD: &str = "(fn add ((a i32) (b i32)) i32 (+ a b)) (export add)";

const FACTORIAL: &str = "(fn factorial ((n i32)) i32 \
     (var r i32 1) (var i i32 1) \
     (while (<= i n) (set r (* r i)) (set i (+ i 1))) \
     r) \
     (export factorial)";

const ABS: &str = "(fn abs ((x i32)) i32 (if (< x 0) (- 0 x) x)) (export abs)";

const FIB: &str =
    "(fn fib ((n i32)) i32 (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (export fib)";

const ECHO: &str = "(fn echo ((p i32) (n i32)) i32 \
     (var o i32 0x20000) \
     (store i32 o n) \
     (var i i32 0) \
     (while (< i n) \
         (store i32 (+ (+ o 4) i) (load i32 (+ p i))) \
         (set i (+ i 1))) \
     o) \
     (export echo) (export memory)";

const KITCHEN_SINK: &str = "
; exercises every operator family plus imports and nested declarations
(import env log ((ptr i32) (len i32)))
(import env now () i64)
(fn wide ((a i64) (b i64)) i64 (+ (* a b) (% a (- b (now)))))
(fn frac ((x f64) (y f64)) f64 (/ (* x y) (- x 0.5)))
(fn bits ((a i32) (b i32)) i32 (xor (and a b) (or (shl a 1) (shr b 2))))
(fn cmp ((a i64) (b i64)) i32 (and (<= a b) (!= a b)))
(fn store_all ((p i32))
    (store i64 p (now))
    (store f32 (+ p 8) (load f32 p))
    (store f64 (+ p 16) (load f64 p)))
(fn control ((n i32)) i32
    (var acc i32 0)
    (while (< acc n)
        (if (== acc 5)
            (block (log acc 1) (set acc (+ acc 2)))
            (set acc (+ acc 1))))
    (if (> acc 100) (- acc 100) acc))
(export wide) (export frac) (export bits) (export control)
";

/// Asserts that a conforming validator accepts `wasm`.
fn validate(wasm: &[u8]) {
    if let Err(error) = wasmparser::Validator::new().validate_all(wasm) {
        panic!("emitted module failed validation: {error}");
    }
}

/// Decodes the section ids of `wasm` in emission order.
fn section_ids(wasm: &[u8]) -> Vec<u8> {
    let mut ids = Vec::new();
    let mut pos = 8;
    while pos < wasm.len() {
        let id = wasm[pos];
        pos += 1;

        let mut size = 0u32;
        let mut shift = 0;
        loop {
            let byte = wasm[pos];
            pos += 1;
            size |= u32::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }

        ids.push(id);
        pos += size as usize;
    }
    ids
}

#[test]
fn emits_exact_header() {
    let wasm = compile(ADD).unwrap();
    assert_eq!(&wasm[..8], [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00]);
}

#[test]
fn add_module_bytes_are_exact() {
    let wasm = compile(ADD).unwrap();
    let expected: Vec<u8> = [
        // magic + version
        vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00],
        // type: (i32, i32) -> i32
        vec![0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F],
        // function: one definition of type 0
        vec![0x03, 0x02, 0x01, 0x00],
        // export: "add" -> function 0
        vec![0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00],
        // code: local.get 0, local.get 1, i32.add, end
        vec![
            0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B,
        ],
    ]
    .concat();
    assert_eq!(wasm, expected);
}

#[test]
fn memory_module_bytes_are_exact() {
    let wasm = compile("(fn poke ((a i32)) (store i32 a 1))").unwrap();
    let expected: Vec<u8> = [
        vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00],
        // type: (i32) -> void
        vec![0x01, 0x05, 0x01, 0x60, 0x01, 0x7F, 0x00],
        vec![0x03, 0x02, 0x01, 0x00],
        // memory: one page, no maximum
        vec![0x05, 0x03, 0x01, 0x00, 0x01],
        // export: the automatic "memory" export
        vec![
            0x07, 0x0A, 0x01, 0x06, b'm', b'e', b'm', b'o', b'r', b'y', 0x02, 0x00,
        ],
        // code: local.get 0, i32.const 1, i32.store align=2 offset=0, end
        vec![
            0x0A, 0x0B, 0x01, 0x09, 0x00, 0x20, 0x00, 0x41, 0x01, 0x36, 0x02, 0x00, 0x0B,
        ],
    ]
    .concat();
    assert_eq!(wasm, expected);
}

#[test]
fn accepted_scenarios_validate() {
    for source in [ADD, FACTORIAL, ABS, FIB, ECHO, KITCHEN_SINK] {
        validate(&compile(source).unwrap());
    }
}

#[test]
fn section_ids_ascend_strictly() {
    for source in [ADD, ECHO, KITCHEN_SINK, "(fn only () (block))"] {
        let wasm = compile(source).unwrap();
        let ids = section_ids(&wasm);
        assert!(
            ids.windows(2).all(|pair| pair[0] < pair[1]),
            "section order {ids:?} for {source}"
        );
        assert!(ids.iter().all(|id| [1, 2, 3, 5, 7, 10].contains(id)));
    }
}

#[test]
fn structurally_equal_signatures_share_a_type_entry() {
    let wasm =
        compile("(fn a ((x i32)) i32 x) (fn b ((y i32)) i32 y) (export a) (export b)").unwrap();
    validate(&wasm);

    let mut type_count = 0;
    let mut function_types = Vec::new();
    for payload in wasmparser::Parser::new(0).parse_all(&wasm) {
        match payload.unwrap() {
            wasmparser::Payload::TypeSection(section) => type_count = section.count(),
            wasmparser::Payload::FunctionSection(section) => {
                function_types = section.into_iter().map(Result::unwrap).collect();
            }
            _ => {}
        }
    }
    assert_eq!(type_count, 1);
    assert_eq!(function_types, [0, 0]);
}

#[test]
fn output_is_deterministic() {
    assert_eq!(compile(KITCHEN_SINK).unwrap(), compile(KITCHEN_SINK).unwrap());
}

#[test]
fn empty_source_emits_a_bare_module() {
    let wasm = compile("; nothing but a comment\n").unwrap();
    assert_eq!(wasm.len(), 8);
    validate(&wasm);
}

#[test]
fn imports_claim_the_low_function_indices() {
    let wasm = compile("(import env nop ()) (fn call_it () (nop)) (export call_it)").unwrap();
    validate(&wasm);

    let mut found = false;
    for payload in wasmparser::Parser::new(0).parse_all(&wasm) {
        if let wasmparser::Payload::ExportSection(section) = payload.unwrap() {
            let export = section.into_iter().next().unwrap().unwrap();
            assert_eq!(export.name, "call_it");
            assert_eq!(export.kind, wasmparser::ExternalKind::Func);
            assert_eq!(export.index, 1);
            found = true;
        }
    }
    assert!(found, "no export section was emitted");
}

#[test]
fn locals_are_grouped_by_type_after_parameters() {
    let source = "(fn locals ((p i64)) \
         (var a i32 0) \
         (var b i32 1) \
         (var c f64 2.0) \
         (while (< a b) (var d i32 3) (set a (+ a d))))";
    let wasm = compile(source).unwrap();
    validate(&wasm);

    let mut found = false;
    for payload in wasmparser::Parser::new(0).parse_all(&wasm) {
        if let wasmparser::Payload::CodeSectionEntry(body) = payload.unwrap() {
            let mut locals = body.get_locals_reader().unwrap();
            assert_eq!(locals.get_count(), 3);
            assert_eq!(locals.read().unwrap(), (2, wasmparser::ValType::I32));
            assert_eq!(locals.read().unwrap(), (1, wasmparser::ValType::F64));
            assert_eq!(locals.read().unwrap(), (1, wasmparser::ValType::I32));
            found = true;
        }
    }
    assert!(found, "no code section entry was emitted");
}

#[test]
fn memory_pages_option_raises_the_initial_allocation() {
    let wasm = Compile::new()
        .memory_pages(3)
        .compile("(fn poke () (store i32 0x10000 1))")
        .unwrap();
    validate(&wasm);

    let mut found = false;
    for payload in wasmparser::Parser::new(0).parse_all(&wasm) {
        if let wasmparser::Payload::MemorySection(section) = payload.unwrap() {
            let memory = section.into_iter().next().unwrap().unwrap();
            assert_eq!(memory.initial, 3);
            assert_eq!(memory.maximum, None);
            found = true;
        }
    }
    assert!(found, "no memory section was emitted");
}

#[test]
fn negative_and_hex_literals_lex_as_single_tokens() {
    validate(&compile("(fn f () i32 (+ -5 0x10))").unwrap());
}

#[test]
fn duplicate_function_names_are_fatal() {
    assert_eq!(
        compile("(fn a () i32 0) (fn a () i32 1)").unwrap_err(),
        Error::DuplicateDefinition
    );
}

#[test]
fn duplicate_parameters_and_locals_are_fatal() {
    assert_eq!(
        compile("(fn f ((x i32) (x i32)) i32 x)").unwrap_err(),
        Error::DuplicateDefinition
    );
    assert_eq!(
        compile("(fn f () (var x i32 0) (var x i32 1))").unwrap_err(),
        Error::DuplicateDefinition
    );
}

#[test]
fn unknown_callee_is_undefined() {
    assert_eq!(
        compile("(fn a () i32 (b))").unwrap_err(),
        Error::UndefinedFunction
    );
}

#[test]
fn unknown_export_is_undefined() {
    assert_eq!(
        compile("(fn a () i32 0) (export missing)").unwrap_err(),
        Error::UndefinedFunction
    );
}

#[test]
fn unknown_identifier_is_undefined() {
    assert_eq!(
        compile("(fn a () i32 x)").unwrap_err(),
        Error::UndefinedVariable
    );
}

#[test]
fn type_mismatches_are_rejected() {
    for source in [
        // operands disagree
        "(fn f ((a i32)) i32 (+ a 1.0))",
        // conditions must be i32
        "(fn f () i32 (if 1.0 1 2))",
        // branches must agree
        "(fn f () i32 (if 1 2 3.0))",
        // the declared return must match the final expression
        "(fn f () i32 1.0)",
        "(fn f () i64)",
        // initializers and assignments must match the declared type
        "(fn f () (var x i32 1.0))",
        "(fn f () (var x i32 0) (set x 1.0))",
        // stored values and addresses
        "(fn f () (store i32 0 1.0))",
        "(fn f () (load i32 1.0))",
        // call arity and argument types
        "(fn g ((x i32)) i32 x) (fn f () i32 (g))",
        "(fn g ((x i32)) i32 x) (fn f () i32 (g 1.0))",
    ] {
        assert_eq!(compile(source).unwrap_err(), Error::TypeMismatch, "{source}");
    }
}

#[test]
fn float_operands_reject_integer_only_operators() {
    for source in [
        "(fn f () f64 (% 1.0 2.0))",
        "(fn f () f64 (and 1.0 2.0))",
        "(fn f () f64 (shl 1.0 2.0))",
    ] {
        assert_eq!(
            compile(source).unwrap_err(),
            Error::UnsupportedOperator,
            "{source}"
        );
    }
}

#[test]
fn oversized_integer_literals_overflow() {
    // beyond the signed 64-bit range
    assert_eq!(
        compile("(fn f () i32 9223372036854775808)").unwrap_err(),
        Error::Overflow
    );
    assert_eq!(
        compile("(fn f () i32 0xFFFFFFFFFFFFFFFF)").unwrap_err(),
        Error::Overflow
    );
    // representable in 64 bits but not as an i32 literal
    assert_eq!(
        compile("(fn f () i32 5000000000)").unwrap_err(),
        Error::Overflow
    );
}

#[test]
fn malformed_source_is_a_syntax_error() {
    for source in [
        "(",
        ")",
        "(fn)",
        "(fn f)",
        "(fn f ((x)) x)",
        "(frob)",
        "(fn i32 () 1)",
        "42",
        "(fn f () (var if i32 0))",
    ] {
        assert_eq!(compile(source).unwrap_err(), Error::Syntax, "{source}");
    }
}

#[test]
fn error_messages_are_stable() {
    insta::assert_snapshot!(
        compile("(fn a () i32 0) (fn a () i32 1)").unwrap_err(),
        @"two definitions share a name"
    );
    insta::assert_snapshot!(
        compile("(fn a () i32 (b))").unwrap_err(),
        @"call or export does not name a known function"
    );
}

#[test]
fn kind_names_are_canonical() {
    assert_eq!(Error::TypeMismatch.name(), "TypeMismatch");
    assert_eq!(Error::DuplicateDefinition.name(), "DuplicateDefinition");
    assert_eq!(Error::Overflow.name(), "Overflow");
}
