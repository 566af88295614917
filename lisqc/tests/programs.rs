//! End-to-end tests: compile lisq sources and execute the images on the
//! machine, checking the observable character output.

use comp3::{ControlUnit, DataPath};
use isa::{OpCode, Program};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::Path;

fn run(program: &Program, input: &str) -> (String, u64) {
    let mut cpu = ControlUnit::new(DataPath::new(program, input)).unwrap();
    cpu.run().unwrap();
    (
        cpu.datapath().io().output_string(),
        cpu.total_ticks(),
    )
}

fn compile_and_run(source: &str, input: &str) -> String {
    let program = lisqc::compile_source(source).unwrap();
    run(&program, input).0
}

#[test]
fn cat() {
    let source = "
        (let ((c 1))
          (loop while c do
            (set c (get_char))
            (put_char c)))";

    // The post-EOF 0 write is part of the model: the loop notices the end
    // of input only after echoing the zero it read.
    let output = compile_and_run(source, "abc");
    assert_eq!(output.as_bytes(), b"abc\0");

    let (output, ticks) = {
        let program = lisqc::compile_source(source).unwrap();
        run(&program, "")
    };
    assert_eq!(output.as_bytes(), b"\0");
    assert!(ticks > 0);
}

#[test]
fn hello_name_with_include() {
    // The buffer declaration comes in through the preprocessor. With no
    // string literals in the program, `name` sits at data address 0, so
    // its first word can serve as the write cursor.
    let dir = tempfile::tempdir().unwrap();
    let mut decl = std::fs::File::create(dir.path().join("decl.lisq")).unwrap();
    decl.write_all(b"(alloc_str name 33)\n").unwrap();
    drop(decl);

    let source = "#include decl.lisq
        (let ((c 0))
          (set name 1)
          (set c (get_char))
          (loop while (!= c 10) do
            (set_ptr name c)
            (set name (+ name 1))
            (set c (get_char)))
          (put_char 72) (put_char 101) (put_char 108) (put_char 108)
          (put_char 111) (put_char 44) (put_char 32)
          (set name 1)
          (loop while (@ name) do
            (put_char (@ name))
            (set name (+ name 1)))
          (put_char 33))";

    let program = lisqc::compile(source, dir.path()).unwrap();
    let (output, _) = run(&program, "Alice\n");

    assert!(output.starts_with("Hello, Alice!"));
}

#[test]
fn arithmetic() {
    assert_eq!(compile_and_run("(put_char (+ 48 5))", ""), "5");
}

#[test]
fn conditional() {
    assert_eq!(
        compile_and_run("(if (< 3 5) (put_char 89) (put_char 78))", ""),
        "Y"
    );
    assert_eq!(
        compile_and_run("(if (> 3 5) (put_char 89) (put_char 78))", ""),
        "N"
    );
    assert_eq!(
        compile_and_run("(if (= 5 5) (put_char 89) (put_char 78))", ""),
        "Y"
    );
}

#[test]
fn function_call() {
    let source = "
        (defun add1 (x) (+ x 1))
        (put_char (add1 64))";

    assert_eq!(compile_and_run(source, ""), "A");
}

#[test]
fn nested_function_calls() {
    let source = "
        (defun add1 (x) (+ x 1))
        (put_char (add1 (add1 (add1 62))))";

    assert_eq!(compile_and_run(source, ""), "A");
}

#[test]
fn loop_with_pointer_stores() {
    // `ptr` lands at data address 0 and holds the running cursor into
    // `buf`, which follows it at addresses 1 through 4.
    let source = "
        (alloc_str ptr 1)
        (alloc_str buf 4)
        (let ((i 0))
          (set ptr 1)
          (loop while (< i 4) do
            (set_ptr ptr 88)
            (set ptr (+ ptr 1))
            (set i (+ i 1)))
          (set ptr 1)
          (set i 0)
          (loop while (< i 4) do
            (put_char (@ ptr))
            (set ptr (+ ptr 1))
            (set i (+ i 1))))";

    assert_eq!(compile_and_run(source, ""), "XXXX");
}

#[test]
fn string_literal_pointer_walk() {
    // A string literal evaluates to its address, so a local can walk it.
    let source = "
        (let ((p \"ok\"))
          (loop while (@ p) do
            (put_char (@ p))
            (set p (+ p 1))))";

    assert_eq!(compile_and_run(source, ""), "ok");
}

#[test]
fn compilation_is_deterministic() {
    let source = "
        (defun add1 (x) (+ x 1))
        (let ((s \"hey\"))
          (put_char (add1 64))
          (put_char s))";

    let first = lisqc::compile_source(source).unwrap();
    let second = lisqc::compile_source(source).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn emulation_is_deterministic() {
    let source = "
        (let ((c 1))
          (loop while c do
            (set c (get_char))
            (put_char c)))";
    let program = lisqc::compile_source(source).unwrap();

    let (out1, ticks1) = run(&program, "xyz");
    let (out2, ticks2) = run(&program, "xyz");

    assert_eq!(out1, out2);
    assert_eq!(ticks1, ticks2);
}

#[test]
fn image_invariants() {
    let source = "
        (let ((a \"hey\") (b \"hey\"))
          (put_char a)
          (put_char b))";
    let program = lisqc::compile_source(source).unwrap();

    // Exactly one trailing HLT.
    assert_eq!(
        program.instructions.last().unwrap().op_code,
        OpCode::Hlt
    );
    assert_eq!(
        program
            .instructions
            .iter()
            .filter(|i| i.op_code == OpCode::Hlt)
            .count(),
        1
    );

    // The literal appears once, NUL-terminated, tagged with its own text.
    let tagged: Vec<usize> = program
        .data_memory
        .iter()
        .enumerate()
        .filter(|(_, w)| w.identifier.as_deref() == Some("hey"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(tagged.len(), 1);

    let start = tagged[0];
    assert_eq!(program.data_memory[start].value, 'h' as u32);
    assert_eq!(program.data_memory[start + 3].value, 0);
}

#[test]
fn compiled_image_survives_serialization() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/prog.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let program = lisqc::compile_source("(put_char (+ 48 5))").unwrap();
    isa::write_file(&path, &program).unwrap();
    let read_back = isa::read_file(&path).unwrap();

    assert_eq!(program, read_back);
    assert_eq!(run(&read_back, "").0, "5");
}

#[test]
fn include_base_dir_is_source_relative() {
    let dir = tempfile::tempdir().unwrap();
    let mut lib = std::fs::File::create(dir.path().join("lib.lisq")).unwrap();
    lib.write_all(b"(defun add1 (x) (+ x 1))\n").unwrap();
    drop(lib);

    let program = lisqc::compile(
        "#include lib.lisq\n(put_char (add1 64))\n",
        dir.path(),
    )
    .unwrap();

    assert_eq!(run(&program, "").0, "A");

    // A bogus base dir must fail loudly, not silently skip the include.
    assert!(lisqc::compile("#include lib.lisq\n", Path::new("/nonexistent")).is_err());
}

// Reference evaluator mirroring the machine's ALU for the expression
// subset the generator below produces.
enum Expr {
    Literal(u32),
    Binary(char, Box<Expr>, Box<Expr>),
    Shift(bool, Box<Expr>, u32),
}

impl Expr {
    fn source(&self) -> String {
        match self {
            Expr::Literal(v) => v.to_string(),
            Expr::Binary(op, l, r) => format!("({} {} {})", op, l.source(), r.source()),
            Expr::Shift(left, l, amount) => format!(
                "({} {} {})",
                if *left { "<<" } else { ">>" },
                l.source(),
                amount
            ),
        }
    }

    fn eval(&self) -> u32 {
        match self {
            Expr::Literal(v) => *v,
            Expr::Binary(op, l, r) => {
                let (l, r) = (l.eval(), r.eval());
                match op {
                    '+' => l.wrapping_add(r),
                    '-' => l.wrapping_sub(r),
                    '&' => l & r,
                    '|' => l | r,
                    _ => unreachable!(),
                }
            }
            Expr::Shift(left, l, amount) => {
                let l = l.eval();
                if *left {
                    ((u64::from(l) << amount) & 0xFFFF_FFFF) as u32
                } else {
                    l >> amount
                }
            }
        }
    }
}

fn gen_expr(rng: &mut StdRng, depth: u32) -> Expr {
    if depth == 0 || rng.gen_range(0..4) == 0 {
        return Expr::Literal(rng.gen_range(0..256));
    }

    match rng.gen_range(0..6) {
        0 => Expr::Binary(
            '+',
            Box::new(gen_expr(rng, depth - 1)),
            Box::new(gen_expr(rng, depth - 1)),
        ),
        1 => Expr::Binary(
            '-',
            Box::new(gen_expr(rng, depth - 1)),
            Box::new(gen_expr(rng, depth - 1)),
        ),
        2 => Expr::Binary(
            '&',
            Box::new(gen_expr(rng, depth - 1)),
            Box::new(gen_expr(rng, depth - 1)),
        ),
        3 => Expr::Binary(
            '|',
            Box::new(gen_expr(rng, depth - 1)),
            Box::new(gen_expr(rng, depth - 1)),
        ),
        4 => Expr::Shift(true, Box::new(gen_expr(rng, depth - 1)), rng.gen_range(0..8)),
        _ => Expr::Shift(false, Box::new(gen_expr(rng, depth - 1)), rng.gen_range(0..8)),
    }
}

#[test]
fn random_arithmetic_matches_reference_evaluator() {
    let mut rng = StdRng::seed_from_u64(0xC0_3);

    for _ in 0..200 {
        let expr = gen_expr(&mut rng, 3);
        let source = format!("(put_char {})", expr.source());
        let expected = (expr.eval() & 0xFF) as u8;

        let program = lisqc::compile_source(&source).unwrap();
        let (output, _) = run(&program, "");

        assert_eq!(
            output.as_bytes(),
            &[expected][..],
            "mismatch for {}",
            source
        );
    }
}
