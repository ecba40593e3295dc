use codegen::compile_source;
use vm::{Instruction, Register};

#[test]
fn globals_live_in_static_memory_in_declaration_order() {
    let program = compile_source(
        r#"
        int a;
        char c;
        int b[3];
        int main(void) { return 0; }
        "#,
    )
    .expect("compile ok");
    // 4 (a) + 1 (c) + 12 (b)
    assert_eq!(program.static_memory.len(), 17);
}

#[test]
fn global_initializers_run_as_startup_code() {
    let program = compile_source(
        r#"
        int x = 42;
        int main(void) { return x; }
        "#,
    )
    .expect("compile ok");

    // The store into x happens before main's label: it belongs to the
    // synthetic start code.
    let main_label = program
        .instructions
        .iter()
        .position(|i| matches!(i, Instruction::Label { name } if name == "main"))
        .expect("main label");
    let store = program
        .instructions
        .iter()
        .position(|i| matches!(i, Instruction::Store { .. }))
        .expect("initializing store");
    assert!(store < main_label);

    // The global's address is a relocatable constant rebased on $gp.
    assert!(program.instructions.iter().any(|i| matches!(
        i,
        Instruction::Set { relocatable: true, .. }
    )));
    assert!(program.instructions.iter().any(|i| matches!(
        i,
        Instruction::Alu { lhs: Register::Gp, .. } | Instruction::Alu { rhs: Register::Gp, .. }
    )));
}

#[test]
fn string_literals_are_interned_nul_terminated() {
    let program = compile_source(
        r#"
        char *greet(void) { return "hi"; }
        int main(void) { return 0; }
        "#,
    )
    .expect("compile ok");

    assert_eq!(&program.static_memory[..3], &[b'h', b'i', 0]);
    assert!(program.instructions.iter().any(|i| matches!(
        i,
        Instruction::Set { relocatable: true, .. }
    )));
}

#[test]
fn string_escapes_decode() {
    let program = compile_source(
        r#"
        char *s = "a\n\x41\0";
        int main(void) { return 0; }
        "#,
    )
    .expect("compile ok");
    // The pointer variable itself occupies the first 8 bytes; the
    // literal's bytes follow.
    let bytes = &program.static_memory[8..13];
    assert_eq!(bytes, &[b'a', b'\n', 0x41, 0, 0]);
}

#[test]
fn extern_globals_still_reserve_storage() {
    let program = compile_source(
        r#"
        extern int shared;
        int main(void) { return shared; }
        "#,
    )
    .expect("compile ok");
    assert_eq!(program.static_memory.len(), 4);
}
