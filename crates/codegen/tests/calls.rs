use codegen::compile_source;
use vm::{Instruction, Number, Register};

fn set_positions(program: &vm::Program, value: i64) -> Vec<usize> {
    program
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(i, inst)| match inst {
            Instruction::Set {
                value: Number::Int(v),
                relocatable: false,
                ..
            } if *v == value => Some(i),
            _ => None,
        })
        .collect()
}

#[test]
fn add_and_main_compile_to_labeled_bodies() {
    let program = compile_source(
        r#"
        int add(int a, int b) { return a + b; }
        int main(void) { return add(2, 3); }
        "#,
    )
    .expect("compile ok");

    let labels: Vec<&str> = program
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Label { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["add", "main"]);

    // The call site resolves the callee symbolically and jumps through
    // a register; both functions end by loading the return address into
    // $pc.
    assert!(program
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::LoadAddr { label, .. } if label == "add")));
    assert!(program
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::JumpReg { .. })));
    let pc_loads = program
        .instructions
        .iter()
        .filter(|i| matches!(i, Instruction::Load { dst: Register::Pc, .. }))
        .count();
    assert_eq!(pc_loads, 2, "one fall-through return per function");
}

#[test]
fn arguments_push_right_to_left_with_count_on_top() {
    let program = compile_source(
        r#"
        int sum(int n, ...);
        int main(void) { return sum(7, 10, 20); }
        "#,
    )
    .expect("compile ok");

    // Variadic extras push first, right to left (20 then 10), then the
    // declared argument (7), then the argument count (3).
    let p20 = set_positions(&program, 20);
    let p10 = set_positions(&program, 10);
    let p7 = set_positions(&program, 7);
    let p3 = set_positions(&program, 3);
    assert_eq!((p20.len(), p10.len(), p7.len(), p3.len()), (1, 1, 1, 1));
    assert!(p20[0] < p10[0] && p10[0] < p7[0] && p7[0] < p3[0]);
}

#[test]
fn argument_count_mismatches_are_reported() {
    let err = compile_source(
        r#"
        int add(int a, int b) { return a + b; }
        int main(void) { return add(1); }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("too few arguments"), "{}", err);

    let err = compile_source(
        r#"
        int add(int a, int b) { return a + b; }
        int main(void) { return add(1, 2, 3); }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("too many arguments"), "{}", err);
}

#[test]
fn prototype_and_definition_unify() {
    compile_source(
        r#"
        int twice(int x);
        int main(void) { return twice(21); }
        int twice(int x) { return x + x; }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn conflicting_definition_is_reported() {
    let err = compile_source(
        r#"
        int f(int x);
        double f(int x) { return 0; }
        int main(void) { return 0; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("conflicting return type"), "{}", err);
}

#[test]
fn redefinition_is_reported() {
    let err = compile_source(
        r#"
        int f(void) { return 1; }
        int f(void) { return 2; }
        int main(void) { return 0; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("redefinition of function 'f'"), "{}", err);
}

#[test]
fn calling_through_a_function_pointer() {
    compile_source(
        r#"
        int add(int a, int b) { return a + b; }
        int main(void) {
            int (*f)(int a, int b);
            f = add;
            return (*f)(2, 3);
        }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn void_function_calls_compile_and_void_use_is_rejected() {
    compile_source(
        r#"
        void nothing(void) { return; }
        int main(void) { nothing(); return 0; }
        "#,
    )
    .expect("compile ok");

    let err = compile_source(
        r#"
        void nothing(void) { return; }
        int main(void) { int x; x = nothing(); return x; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("void value not ignored"), "{}", err);
}

#[test]
fn returning_a_value_from_void_is_reported() {
    let err = compile_source(
        r#"
        void f(void) { return 1; }
        int main(void) { return 0; }
        "#,
    )
    .unwrap_err();
    assert!(
        err.to_string().contains("returning a value from a void function"),
        "{}",
        err
    );
}

#[test]
fn calls_nest_inside_expressions() {
    // Registers must be fully free at each call; evaluation-stack slots
    // carry intermediate values across the calls.
    compile_source(
        r#"
        int add(int a, int b) { return a + b; }
        int main(void) { return add(add(1, 2), add(3, 4)) + add(5, 6); }
        "#,
    )
    .expect("compile ok");
}
