use codegen::compile_source;
use vm::Instruction;

fn landing(index: usize, target: i32) -> usize {
    (index as i32 + 1 + target) as usize
}

#[test]
fn continue_outside_a_loop_is_reported() {
    let err = compile_source("int main(void) { continue; }").unwrap_err();
    assert!(err.to_string().contains("continue outside"), "{}", err);
}

#[test]
fn break_outside_a_loop_is_reported() {
    let err = compile_source("int main(void) { break; }").unwrap_err();
    assert!(err.to_string().contains("break outside"), "{}", err);
}

#[test]
fn for_continue_jumps_to_the_step_expression() {
    let program = compile_source(
        r#"
        int main(void) {
            int i;
            for (i = 0; i < 3; i = i + 1) { continue; }
            return i;
        }
        "#,
    )
    .expect("compile ok");

    // Three unconditional jumps: the first-iteration skip over the
    // step, the continue, and the loop's back jump. The continue lands
    // exactly where the skip jump starts counting from: the step
    // expression.
    let jumps: Vec<(usize, i32)> = program
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(i, inst)| match inst {
            Instruction::Jump { target } => Some((i, *target)),
            _ => None,
        })
        .collect();
    assert_eq!(jumps.len(), 3, "program:\n{}", program);

    let (skip_at, _) = jumps[0];
    let step_begin = skip_at + 1;
    let (cont_at, cont_target) = jumps[1];
    assert!(cont_target < 0, "continue jumps backward");
    assert_eq!(landing(cont_at, cont_target), step_begin);

    let (back_at, back_target) = jumps[2];
    assert!(back_target < 0);
    assert_eq!(landing(back_at, back_target), step_begin);
}

#[test]
fn while_continue_reevaluates_the_condition() {
    let program = compile_source(
        r#"
        int main(void) {
            int i;
            i = 0;
            while (i < 3) { i = i + 1; continue; }
            return i;
        }
        "#,
    )
    .expect("compile ok");

    // The continue jump and the loop's back jump land on the same
    // instruction: the start of the condition evaluation.
    let jumps: Vec<(usize, i32)> = program
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(i, inst)| match inst {
            Instruction::Jump { target } => Some((i, *target)),
            _ => None,
        })
        .collect();
    assert_eq!(jumps.len(), 2, "program:\n{}", program);
    assert_eq!(
        landing(jumps[0].0, jumps[0].1),
        landing(jumps[1].0, jumps[1].1)
    );
}

#[test]
fn break_in_single_statement_loop_body() {
    compile_source("int main(void) { while (1) break; return 0; }").expect("compile ok");
}

#[test]
fn if_else_and_loops_compile_balanced() {
    compile_source(
        r#"
        int main(void) {
            int i;
            int n;
            n = 0;
            for (i = 0; i < 10; i = i + 1) {
                if (i % 2) { n = n + i; } else { n = n - 1; }
                while (n > 100) { n = n / 2; }
            }
            do { n = n + 1; } while (n < 0);
            return n;
        }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn nested_break_targets_the_nearest_loop() {
    compile_source(
        r#"
        int main(void) {
            int i;
            int j;
            int s;
            s = 0;
            for (i = 0; i < 3; i = i + 1) {
                for (j = 0; j < 3; j = j + 1) {
                    if (j == 2) { break; }
                    s = s + 1;
                }
            }
            return s;
        }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn goto_emits_symbolic_jump_and_label() {
    let program = compile_source(
        r#"
        int main(void) {
            int x;
            x = 0;
            goto done;
            x = 1;
        done:
            return x;
        }
        "#,
    )
    .expect("compile ok");

    assert!(program
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::JumpLabel { label } if label == ".L.done")));
    assert!(program
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::Label { name } if name == ".L.done")));
}

#[test]
fn block_locals_are_deallocated_at_scope_exit() {
    // Scope accounting is asserted internally; a leak would panic.
    compile_source(
        r#"
        int main(void) {
            int x;
            x = 0;
            {
                int y;
                y = 1;
                { int z; z = y; x = z; }
            }
            return x;
        }
        "#,
    )
    .expect("compile ok");
}
