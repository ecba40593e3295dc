use codegen::compile_source;

#[test]
fn array_initializes_pointer_of_equal_element() {
    compile_source(
        r#"
        int a[5];
        int *p = a;
        int main(void) { return 0; }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn array_assigns_to_pointer_of_equal_element() {
    compile_source(
        r#"
        int main(void) {
            int a[5];
            int *p = a;
            int b[5];
            p = b;
            return 0;
        }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn array_does_not_decay_to_unequal_pointee() {
    let err = compile_source(
        r#"
        int a[5];
        double *q = a;
        int main(void) { return 0; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("implicit conversion"), "{}", err);
}

#[test]
fn void_pointer_accepts_any_array() {
    compile_source(
        r#"
        int a[5];
        void *p = a;
        int main(void) { return 0; }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn indexing_and_deref_are_lvalues() {
    compile_source(
        r#"
        int main(void) {
            int a[3];
            int *p;
            a[0] = 1;
            a[1] = 2;
            a[2] = a[0] + a[1];
            p = a;
            *p = 9;
            p[1] = *p + a[2];
            return a[2];
        }
        "#,
    )
    .expect("compile ok");
}

#[test]
fn unknown_array_size_is_reported() {
    let err = compile_source(
        r#"
        int main(void) { int a[]; return 0; }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown size"), "{}", err);
}

#[test]
fn array_parameter_decays_in_the_callee() {
    compile_source(
        r#"
        int first(int a[], int n) { return a[0] + n; }
        int main(void) {
            int xs[4];
            xs[0] = 7;
            return first(xs, 0);
        }
        "#,
    )
    .expect("compile ok");
}
