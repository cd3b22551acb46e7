// tests/workflow_scenarios.rs
//
// End-to-end runs through a real shell. Every output lives in a temp dir and
// every process name is unique, since task workdirs are created in the
// current directory.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use scipipe::Workflow;
use scipipe::components::Sink;
use scipipe::errors::SciPipeError;
use scipipe::exec::make_fifo;
use scipipe::ip::AuditInfo;

mod common;
use crate::common::{
    RecordingBackend, exists, init_tracing, leftover_workdirs, path_in, read_trimmed, with_timeout,
    write_file,
};

type TestResult = Result<(), Box<dyn Error>>;

fn values(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hello_world_chain_writes_outputs_and_audit() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut wf = Workflow::with_capacity("hello_world", 4, 16).with_backend(RecordingBackend::shell());
    let hello = wf.new_proc("hw_hello", "echo 'Hello ' > {o:out}")?;
    hello.set_out_path("out", &path_in(dir.path(), "hello.txt"))?;

    let world = wf.new_proc("hw_world", "echo $(cat {i:in}) World > {o:out}")?;
    world.set_out_path("out", "{i:in|%.txt}_world.txt")?;

    hello.out_port("out")?.connect(world.in_port("in")?)?;
    wf.add_to_sink(world.out_port("out")?)?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    let out = path_in(dir.path(), "hello_world.txt");
    assert_eq!(read_trimmed(&out), "Hello World");
    assert!(!exists(&format!("{out}.tmp")));
    assert_eq!(sink.received(), vec![out.clone()]);

    let audit = AuditInfo::read_from(format!("{out}.audit.json"))?;
    assert_eq!(audit.process_name, "hw_world");
    assert!(audit.exec_time_ns >= 0);
    assert_eq!(audit.upstream_audit_infos["in"].process_name, "hw_hello");
    assert!(leftover_workdirs("hw_world").is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parameter_cross_product_runs_every_combination() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let base = dir.path().to_string_lossy().into_owned();

    let mut wf = Workflow::with_capacity("cross", 4, 16).with_backend(RecordingBackend::shell());
    let params = wf.new_param_cross_product(
        "cp_params",
        values(&[("a", &["a1", "a2"]), ("b", &["b1", "b2"])]),
    )?;
    let echo = wf.new_proc("cp_echo", "echo {p:a} {p:b} > {o:out}")?;
    echo.set_out_path("out", &format!("{base}/{{p:a}}_{{p:b}}.txt"))?;

    params.out("a")?.connect(echo.param_port("a")?)?;
    params.out("b")?.connect(echo.param_port("b")?)?;
    wf.add_to_sink(echo.out_port("out")?)?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    let expected: Vec<String> = ["a1_b1", "a1_b2", "a2_b1", "a2_b2"]
        .iter()
        .map(|n| format!("{base}/{n}.txt"))
        .collect();
    assert_eq!(sink.received(), expected);
    assert_eq!(read_trimmed(&expected[2]), "a2 b1");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn streaming_output_is_piped_without_a_final_file() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let numbers = path_in(dir.path(), "numbers.txt");

    let mut wf = Workflow::with_capacity("streaming", 4, 16).with_backend(RecordingBackend::shell());
    let producer = wf.new_proc("st_producer", "seq 1 5 > {os:out}")?;
    producer.set_out_path("out", &numbers)?;
    let consumer = wf.new_proc("st_consumer", "cat {i:in} | wc -l > {o:out}")?;
    consumer.set_out_path("out", "{i:in}.count")?;

    producer.out_port("out")?.connect(consumer.in_port("in")?)?;
    wf.add_to_sink(consumer.out_port("out")?)?;

    with_timeout(wf.run()).await?;

    assert_eq!(read_trimmed(&format!("{numbers}.count")), "5");
    assert!(!exists(&numbers));
    assert!(!exists(&format!("{numbers}.fifo")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_in_processes_packets_from_both_upstreams() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut wf = Workflow::with_capacity("fan_in", 4, 16).with_backend(RecordingBackend::shell());
    let a = wf.new_proc("fi_a", "echo a > {o:out}")?;
    a.set_out_path("out", &path_in(dir.path(), "a.txt"))?;
    let b = wf.new_proc("fi_b", "echo b > {o:out}")?;
    b.set_out_path("out", &path_in(dir.path(), "b.txt"))?;
    let upper = wf.new_proc("fi_upper", "tr a-z A-Z < {i:in} > {o:out}")?;
    upper.set_out_extend("out", "in", ".upper")?;

    wf.connect("fi_a.out", "fi_upper.in")?;
    wf.connect("fi_b.out", "fi_upper.in")?;
    wf.connect("fi_upper.out", "sink")?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    let mut got = sink.received();
    got.sort();
    let a_upper = path_in(dir.path(), "a.txt.upper");
    let b_upper = path_in(dir.path(), "b.txt.upper");
    assert_eq!(got, vec![a_upper.clone(), b_upper.clone()]);
    assert_eq!(read_trimmed(&a_upper), "A");
    assert_eq!(read_trimmed(&b_upper), "B");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn existing_outputs_are_not_recomputed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = write_file(dir.path(), "existing.txt", "old");

    let backend = RecordingBackend::shell();
    let mut wf = Workflow::with_capacity("skip_existing", 2, 16).with_backend(backend.clone());
    let writer = wf.new_proc("skip_writer", "echo new > {o:out}")?;
    writer.set_out_path("out", &out)?;
    wf.add_to_sink(writer.out_port("out")?)?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 0);
    assert_eq!(fs::read_to_string(&out)?, "old");
    assert_eq!(sink.received(), vec![out]);
    Ok(())
}

/// Hello-world chain writing into `dir`.
fn hello_chain(
    dir: &std::path::Path,
    backend: Arc<RecordingBackend>,
) -> Result<(Workflow, Arc<Sink>), Box<dyn Error>> {
    let mut wf = Workflow::with_capacity("rerun", 4, 16).with_backend(backend);
    let hello = wf.new_proc("rr_hello", "echo 'Hello ' > {o:out}")?;
    hello.set_out_path("out", &path_in(dir, "hello.txt"))?;
    let world = wf.new_proc("rr_world", "echo $(cat {i:in}) World > {o:out}")?;
    world.set_out_path("out", "{i:in|%.txt}_world.txt")?;

    hello.out_port("out")?.connect(world.in_port("in")?)?;
    wf.add_to_sink(world.out_port("out")?)?;
    let sink = wf.sink().clone();
    Ok((wf, sink))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_run_of_a_finished_chain_runs_nothing() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = path_in(dir.path(), "hello_world.txt");

    let first = RecordingBackend::shell();
    let (wf, _) = hello_chain(dir.path(), first.clone())?;
    with_timeout(wf.run()).await?;
    assert_eq!(first.invocations(), 2);
    let modified = fs::metadata(&out)?.modified()?;

    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = RecordingBackend::shell();
    let (wf, sink) = hello_chain(dir.path(), second.clone())?;
    with_timeout(wf.run()).await?;

    assert_eq!(second.invocations(), 0);
    assert_eq!(fs::metadata(&out)?.modified()?, modified);
    assert_eq!(read_trimmed(&out), "Hello World");
    assert_eq!(sink.received(), vec![out]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn streaming_writer_runs_even_when_its_regular_outputs_exist() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = write_file(dir.path(), "log.txt", "old");
    let data = path_in(dir.path(), "data.txt");

    let backend = RecordingBackend::shell();
    let mut wf = Workflow::with_capacity("mixed_rerun", 4, 16).with_backend(backend.clone());
    let producer = wf.new_proc("mx_prod", "echo hi > {o:log}; seq 1 3 > {os:data}")?;
    producer.set_out_path("log", &log)?;
    producer.set_out_path("data", &data)?;
    let consumer = wf.new_proc("mx_cons", "cat {i:in} | wc -l > {o:out}")?;
    consumer.set_out_path("out", "{i:in}.count")?;

    wf.connect("mx_prod.data", "mx_cons.in")?;
    wf.connect("mx_prod.log", "sink")?;
    wf.connect("mx_cons.out", "sink")?;

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 2);
    assert_eq!(read_trimmed(&format!("{data}.count")), "3");
    assert_eq!(read_trimmed(&log), "hi");
    assert!(!exists(&format!("{data}.fifo")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leftover_temp_on_a_streaming_writer_publishes_no_fifo() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = path_in(dir.path(), "log.txt");
    write_file(dir.path(), "log.txt.tmp", "partial");
    let data = path_in(dir.path(), "data.txt");

    let backend = RecordingBackend::shell();
    let mut wf = Workflow::with_capacity("mixed_temp", 4, 16).with_backend(backend.clone());
    let producer = wf.new_proc("mt_prod", "echo hi > {o:log}; seq 1 3 > {os:data}")?;
    producer.set_out_path("log", &log)?;
    producer.set_out_path("data", &data)?;
    let consumer = wf.new_proc("mt_cons", "cat {i:in} | wc -l > {o:out}")?;
    consumer.set_out_path("out", "{i:in}.count")?;

    wf.connect("mt_prod.data", "mt_cons.in")?;
    wf.connect("mt_prod.log", "sink")?;
    wf.connect("mt_cons.out", "sink")?;

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 0);
    assert!(!exists(&format!("{data}.fifo")));
    assert!(!exists(&format!("{data}.count")));
    assert_eq!(read_trimmed(&format!("{log}.tmp")), "partial");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn existing_fifo_skips_the_task_but_forwards_regular_outputs() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = path_in(dir.path(), "log.txt");
    let data = path_in(dir.path(), "data.txt");
    let fifo = format!("{data}.fifo");
    make_fifo(&fifo).await?;

    let backend = RecordingBackend::fake(Duration::ZERO);
    let mut wf = Workflow::with_capacity("fifo_exists", 2, 16).with_backend(backend.clone());
    let producer = wf.new_proc("fe_prod", "echo hi > {o:log}; seq 1 3 > {os:data}")?;
    producer.set_out_path("log", &log)?;
    producer.set_out_path("data", &data)?;
    wf.connect("fe_prod.log", "sink")?;
    wf.connect("fe_prod.data", "sink")?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 0);
    assert_eq!(sink.received(), vec![log]);
    assert!(exists(&fifo));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leftover_temp_file_skips_the_task() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = path_in(dir.path(), "half.txt");
    write_file(dir.path(), "half.txt.tmp", "partial");

    let backend = RecordingBackend::shell();
    let mut wf = Workflow::with_capacity("skip_temp", 2, 16).with_backend(backend.clone());
    let writer = wf.new_proc("temp_writer", "echo done > {o:out}")?;
    writer.set_out_path("out", &out)?;
    wf.add_to_sink(writer.out_port("out")?)?;

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 0);
    assert!(!exists(&out));
    assert_eq!(read_trimmed(&format!("{out}.tmp")), "partial");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_to_process_leaves_downstream_untouched() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let first = path_in(dir.path(), "first.txt");

    let mut wf = Workflow::with_capacity("run_to", 4, 16).with_backend(RecordingBackend::shell());
    let a = wf.new_proc("rt_a", "echo a > {o:out}")?;
    a.set_out_path("out", &first)?;
    let b = wf.new_proc("rt_b", "cat {i:in} > {o:out}")?;
    b.set_out_extend("out", "in", ".b")?;
    let c = wf.new_proc("rt_c", "cat {i:in} > {o:out}")?;
    c.set_out_extend("out", "in", ".c")?;

    wf.connect("rt_a.out", "rt_b.in")?;
    wf.connect("rt_b.out", "rt_c.in")?;
    wf.connect("rt_c.out", "sink")?;

    with_timeout(wf.run_to_process("rt_b")).await?;

    assert!(exists(&first));
    assert!(exists(&format!("{first}.b")));
    assert!(!exists(&format!("{first}.b.c")));
    Ok(())
}

#[tokio::test]
async fn run_to_unknown_process_fails() -> TestResult {
    let mut wf = Workflow::with_capacity("run_to_unknown", 2, 4).with_backend(RecordingBackend::fake(Default::default()));
    wf.new_proc("rtu_only", "true")?;
    let err = wf.run_to_process("nope").await.unwrap_err();
    assert!(matches!(err, SciPipeError::ProcessNotFound(ref n) if n == "nope"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sink_receives_outputs_in_input_order() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let inputs: Vec<String> = (1..=6)
        .map(|i| write_file(dir.path(), &format!("in_{i}.txt"), &i.to_string()))
        .collect();

    let mut wf = Workflow::with_capacity("ordering", 4, 16).with_backend(RecordingBackend::shell());
    let source = wf.new_file_source("ord_files", inputs.clone())?;
    // Later inputs finish first.
    let copy = wf.new_proc("ord_copy", "sleep 0.$((7 - $(cat {i:in}))); cat {i:in} > {o:out}")?;
    copy.set_out_extend("out", "in", ".copy")?;

    source.out().connect(copy.in_port("in")?)?;
    wf.add_to_sink(copy.out_port("out")?)?;
    let sink = wf.sink().clone();

    with_timeout(wf.run()).await?;

    let expected: Vec<String> = inputs.iter().map(|p| format!("{p}.copy")).collect();
    assert_eq!(sink.received(), expected);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn substream_gatherer_bundles_files_for_one_task() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let parts: Vec<String> = (1..=3)
        .map(|i| write_file(dir.path(), &format!("part_{i}.txt"), &format!("{i}\n")))
        .collect();
    let merged = path_in(dir.path(), "merged.txt");

    let mut wf = Workflow::with_capacity("gather", 4, 16).with_backend(RecordingBackend::shell());
    let source = wf.new_file_source("ga_parts", parts)?;
    let gather = wf.new_substream_gatherer("ga_gather")?;
    let merge = wf.new_proc("ga_merge", "cat {i:parts:r: } > {o:out}")?;
    merge.set_out_path("out", &merged)?;

    source.out().connect(gather.in_port())?;
    gather.out().connect(merge.in_port("parts")?)?;
    wf.add_to_sink(merge.out_port("out")?)?;

    with_timeout(wf.run()).await?;

    assert_eq!(fs::read_to_string(&merged)?, "1\n2\n3\n");
    let audit = AuditInfo::read_from(format!("{merged}.audit.json"))?;
    assert_eq!(audit.process_name, "ga_merge");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn custom_execute_replaces_the_shell() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = path_in(dir.path(), "custom.txt");

    let backend = RecordingBackend::shell();
    let mut wf = Workflow::with_capacity("custom", 2, 16).with_backend(backend.clone());
    let params = wf.new_param_source("cu_params", values(&[("word", &["rust"])]))?;
    let custom = wf.new_proc("cu_write", "never-run {p:word} > {o:out}")?;
    custom.set_out_path("out", &out)?;
    custom.set_custom_execute(|task| {
        let temp = task
            .out_temp_path("out")
            .ok_or_else(|| anyhow::anyhow!("no out-port"))?;
        fs::write(temp, format!("custom {}", task.param("word").unwrap_or_default()))?;
        Ok(())
    });

    params.out("word")?.connect(custom.param_port("word")?)?;
    wf.add_to_sink(custom.out_port("out")?)?;

    with_timeout(wf.run()).await?;

    assert_eq!(backend.invocations(), 0);
    assert_eq!(fs::read_to_string(&out)?, "custom rust");
    assert!(exists(&format!("{out}.audit.json")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_command_reports_exit_code_126() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = path_in(dir.path(), "never.txt");

    let mut wf = Workflow::with_capacity("failing", 2, 16).with_backend(RecordingBackend::shell());
    let failing = wf.new_proc("fail_proc", "echo oops >&2; exit 3; touch {o:out}")?;
    failing.set_out_path("out", &out)?;
    wf.add_to_sink(failing.out_port("out")?)?;

    let err = with_timeout(wf.run()).await.unwrap_err();
    match &err {
        SciPipeError::CommandFailed { process, code, output, .. } => {
            assert_eq!(process, "fail_proc");
            assert_eq!(*code, Some(3));
            assert!(output.contains("oops"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 126);
    assert!(!exists(&out));
    assert!(leftover_workdirs("fail_proc").is_empty());
    Ok(())
}
