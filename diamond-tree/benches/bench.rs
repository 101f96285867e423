use criterion::*;
use diamond_schema::Schema;
use diamond_tree::read;

const SCHEMA: &str = r#"
<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <start>
    <element name="tree"><ref name="node"/></element>
  </start>
  <define name="node">
    <element name="node">
      <attribute name="name"><data type="string"/></attribute>
      <optional><element name="weight"><data type="float"/></element></optional>
      <zeroOrMore><ref name="node"/></zeroOrMore>
    </element>
  </define>
</grammar>
"#;

/// A complete tree of `<node>`s, `fanout` children per level
fn document(depth: usize, fanout: usize) -> String {
    fn node(out: &mut String, name: &str, depth: usize, fanout: usize) {
        out.push_str(&format!("<node name=\"{}\"><weight>0.5</weight>", name));
        if depth > 0 {
            for i in 0..fanout {
                node(out, &format!("{}.{}", name, i), depth - 1, fanout);
            }
        }
        out.push_str("</node>");
    }
    let mut out = String::from("<tree>");
    node(&mut out, "n", depth, fanout);
    out.push_str("</tree>");
    out
}

fn compile_and_read(c: &mut Criterion) {
    let doc = document(4, 4);
    let mut group = c.benchmark_group("recursive");
    group.bench_function("compile", |b| {
        b.iter(|| Schema::compile(SCHEMA).expect("Schema::compile()"));
    });
    let schema = Schema::compile(SCHEMA).expect("Schema::compile()");
    group.bench_function("read", |b| {
        b.iter(|| read(&schema, &doc).expect("read()"));
    });
    group.bench_function("read_write", |b| {
        b.iter(|| {
            let (tree, _) = read(&schema, &doc).expect("read()");
            tree.to_xml_string().expect("to_xml_string()")
        });
    });
    group.finish();
}

criterion_group!(benches, compile_and_read);
criterion_main!(benches);
