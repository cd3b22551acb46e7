// tests/task_build.rs

use std::error::Error;
use std::sync::Arc;

use scipipe::errors::SciPipeError;
use scipipe::ip::{FileIp, Ip, SubStream};
use scipipe::process::Process;
use scipipe::task::workdir::{INPUT_HASH_CHARS, MAX_WORKDIR_NAME, WORKDIR_PREFIX, workdir_name};
use scipipe::task::{Task, TaskInputs};
use scipipe::types::Params;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn relative_paths_are_rewritten_for_the_workdir() -> TestResult {
    let process = Process::new("count_lines", "wc -l {i:in} > {o:out}", 4)?;
    process.set_out_path("out", "{i:in}.wc")?;
    let blueprint = process.blueprint()?;

    let inputs = TaskInputs::new("count_lines").with_ip("in", Ip::file("data/x.txt")?);
    let task = Task::build(&blueprint, inputs)?;

    assert_eq!(task.command(), "wc -l ../data/x.txt > ../data/x.txt.wc.tmp");
    assert_eq!(task.out_ip("out").map(|ip| ip.path()), Some("data/x.txt.wc"));
    assert_eq!(task.out_temp_path("out").as_deref(), Some("data/x.txt.wc.tmp"));
    let workdir = task.workdir().to_string_lossy().into_owned();
    assert!(workdir.starts_with("_scipipe_tmp.count_lines.x.txt."));
    Ok(())
}

#[test]
fn missing_input_fails_the_build() -> TestResult {
    let process = Process::new("needs_input", "cat {i:in} > {o:out}", 4)?;
    process.set_out_path("out", "copy.txt")?;
    let blueprint = process.blueprint()?;

    let err = Task::build(&blueprint, TaskInputs::new("needs_input")).unwrap_err();
    assert!(matches!(err, SciPipeError::MissingInput { ref port, .. } if port == "in"));
    Ok(())
}

#[test]
fn streaming_outputs_use_the_fifo_path() -> TestResult {
    let process = Process::new("producer", "seq 3 > {os:out}", 4)?;
    process.set_out_path("out", "/tmp/numbers.txt")?;
    let task = Task::build(&process.blueprint()?, TaskInputs::new("producer"))?;

    assert_eq!(task.command(), "seq 3 > /tmp/numbers.txt.fifo");
    assert_eq!(task.streaming_outputs().count(), 1);
    assert_eq!(task.regular_outputs().count(), 0);
    Ok(())
}

#[test]
fn set_stream_turns_a_regular_out_port_into_a_fifo() -> TestResult {
    let process = Process::new("producer2", "seq 3 > {o:out}", 4)?;
    process.set_out_path("out", "/tmp/seq.txt")?;
    process.set_stream("out", true)?;
    let task = Task::build(&process.blueprint()?, TaskInputs::new("producer2"))?;
    assert_eq!(task.command(), "seq 3 > /tmp/seq.txt.fifo");
    Ok(())
}

#[test]
fn streamed_inputs_are_read_from_the_fifo() -> TestResult {
    let process = Process::new("consumer", "sort {i:in} > {o:out}", 4)?;
    process.set_out_extend("out", "in", ".sorted")?;
    let ip = Ip::File(Arc::new(FileIp::new_streaming("/tmp/numbers.txt")?));
    let task = Task::build(
        &process.blueprint()?,
        TaskInputs::new("consumer").with_ip("in", ip),
    )?;
    assert_eq!(
        task.command(),
        "sort /tmp/numbers.txt.fifo > /tmp/numbers.txt.sorted.tmp"
    );

    let renamed = Process::new("renamer", "cp {i:in} {o:out}", 4)?;
    renamed.set_out_replace("out", "in", ".txt", ".csv")?;
    let task = Task::build(
        &renamed.blueprint()?,
        TaskInputs::new("renamer").with_ip("in", Ip::file("/d/table.txt")?),
    )?;
    assert_eq!(task.command(), "cp /d/table.txt /d/table.csv.tmp");
    Ok(())
}

#[test]
fn tags_params_and_prepend_are_expanded() -> TestResult {
    let process = Process::new(
        "tagged",
        "echo {t:in.sample} {t:sample} {p:k} < {i:in} > {o:out}",
        4,
    )?;
    process.set_out_path("out", "{i:in|%.txt}.k{p:k}.txt")?;
    process.set_prepend("nice -n 10");

    let ip = Ip::file("/d/s1.txt")?;
    if let Ip::File(file) = &ip {
        file.set_tag("sample", "s1");
    }
    let task = Task::build(
        &process.blueprint()?,
        TaskInputs::new("tagged").with_ip("in", ip).with_param("k", "7"),
    )?;

    assert_eq!(task.command(), "nice -n 10 echo s1 s1 7 < /d/s1.txt > /d/s1.k7.txt.tmp");
    // Outputs inherit the tags of the inputs.
    assert_eq!(
        task.out_ip("out").and_then(|ip| ip.tag("sample")).as_deref(),
        Some("s1")
    );
    Ok(())
}

#[test]
fn substreams_need_a_reduce_separator() -> TestResult {
    let members = vec![
        Arc::new(FileIp::new("/a/1.txt")?),
        Arc::new(FileIp::new("/a/2.txt")?),
    ];
    let substream = Ip::SubStream(SubStream::new(members));

    let reducing = Process::new("merge", "cat {i:parts:r: } > {o:out}", 4)?;
    reducing.set_out_path("out", "merged.txt")?;
    let task = Task::build(
        &reducing.blueprint()?,
        TaskInputs::new("merge").with_ip("parts", substream.clone()),
    )?;
    assert_eq!(task.command(), "cat /a/1.txt /a/2.txt > ../merged.txt.tmp");

    let plain = Process::new("merge_plain", "cat {i:parts} > {o:out}", 4)?;
    plain.set_out_path("out", "merged.txt")?;
    let err = Task::build(
        &plain.blueprint()?,
        TaskInputs::new("merge_plain").with_ip("parts", substream),
    )
    .unwrap_err();
    assert!(matches!(err, SciPipeError::Placeholder { .. }));
    Ok(())
}

#[test]
fn blueprint_requires_formatters_for_every_out_port() -> TestResult {
    let process = Process::new("no_paths", "cat {i:in} > {o:out}", 4)?;
    assert!(matches!(
        process.blueprint(),
        Err(SciPipeError::ConfigError(_))
    ));

    process.set_out_extend("out", "other", ".x")?;
    assert!(matches!(
        process.blueprint(),
        Err(SciPipeError::ConfigError(_))
    ));

    assert!(process.set_out_path("missing", "x.txt").is_err());
    Ok(())
}

#[test]
fn ports_come_from_placeholders() -> TestResult {
    let mut params = Params::new();
    params.insert("threads".into(), "4".into());
    let process = Process::with_params(
        "align",
        "bwa mem -t {p:threads} {p:ref} {i:reads} > {o:bam}",
        &params,
        4,
    )?;

    assert!(process.in_port("reads").is_ok());
    assert!(process.out_port("bam").is_ok());
    assert!(process.param_port("ref").is_ok());
    assert!(process.param_port("threads").is_err());
    assert_eq!(process.command(), "bwa mem -t 4 {p:ref} {i:reads} > {o:bam}");
    Ok(())
}

#[test]
fn workdir_names_encode_inputs_and_params() -> TestResult {
    let ip = Ip::file("/data/s1.fastq")?;
    let mut params = Params::new();
    params.insert("k".into(), "3".into());

    let name = workdir_name("align", [&ip], &params);
    let digest = name
        .strip_prefix("_scipipe_tmp.align.s1.fastq.k=3.")
        .ok_or("unexpected workdir name")?;
    assert_eq!(digest.len(), INPUT_HASH_CHARS);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(workdir_name("align", std::iter::empty(), &params), "_scipipe_tmp.align.k=3");
    Ok(())
}

#[test]
fn equal_basenames_in_different_directories_get_distinct_workdirs() -> TestResult {
    let a = Ip::file("a/x.txt")?;
    let b = Ip::file("b/x.txt")?;
    let params = Params::new();

    let name_a = workdir_name("merge", [&a], &params);
    let name_b = workdir_name("merge", [&b], &params);

    assert!(name_a.starts_with("_scipipe_tmp.merge.x.txt."));
    assert!(name_b.starts_with("_scipipe_tmp.merge.x.txt."));
    assert_ne!(name_a, name_b);
    assert_eq!(name_a, workdir_name("merge", [&Ip::file("a/x.txt")?], &params));
    Ok(())
}

#[test]
fn long_workdir_names_are_clamped_with_a_hash() -> TestResult {
    let mut params = Params::new();
    params.insert("long".into(), "x".repeat(400));
    let mut other = params.clone();
    other.insert("long".into(), format!("{}y", "x".repeat(399)));

    let name = workdir_name("proc", std::iter::empty(), &params);
    let other_name = workdir_name("proc", std::iter::empty(), &other);

    assert_eq!(name.len(), MAX_WORKDIR_NAME);
    assert!(name.starts_with(WORKDIR_PREFIX));
    assert_ne!(name, other_name);
    Ok(())
}
