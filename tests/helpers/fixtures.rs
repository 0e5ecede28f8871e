use macaroni::core::Report;

/// The report horenso writes for `perl -E 'say 1;warn "$$\n";'`.
pub const SUCCESS_REPORT: &str = r#"{
    "command": "perl -E 'say 1;warn \"$$\\n\";'",
    "commandArgs": ["perl", "-E", "say 1;warn \"$$\\n\";"],
    "output": "1\n95030\n",
    "stdout": "1\n",
    "stderr": "95030\n",
    "exitCode": 0,
    "result": "command exited with code: 0",
    "pid": 95030,
    "startAt": "2015-12-28T00:37:10.494282399+09:00",
    "endAt": "2015-12-28T00:37:10.546466379+09:00",
    "hostname": "webserver.example.com"
}"#;

/// A failed build whose command and output contain markup characters.
pub const FAILURE_REPORT: &str = r#"{
    "command": "make <all>",
    "output": "error: a & b\n",
    "exitCode": 2,
    "startAt": "2024-05-01T10:00:00+09:00",
    "endAt": "2024-05-01T10:00:02.5+09:00",
    "hostname": "web01"
}"#;

/// Unix time of `FAILURE_REPORT`'s endAt.
pub const FAILURE_REPORT_END: i64 = 1714525202;

/// The escaped Slack body for `FAILURE_REPORT` posted to `#ops` with an
/// `@channel` mention.
pub const FAILURE_SLACK_BODY: &str = r##"{"text":":anger: [web01] horenso reports error! exit with 2 @channel","channel":"#ops","link_names":1,"attachments":[{"fallback":"error: a &amp; b\n make &lt;all&gt;","color":"#d22a3c","fields":[{"title":"Hostname","value":"web01"},{"title":"Command","value":"make &lt;all&gt;"},{"title":"ExitCode","value":"2"},{"title":"Output","value":"```\nerror: a &amp; b\n```"},{"title":"Started","value":"2024-05-01T10:00:00+09:00"},{"title":"Ended","value":"2024-05-01T10:00:02.500+09:00"}]}]}"##;

pub fn success_report() -> Report {
    Report::from_json(SUCCESS_REPORT).unwrap()
}

pub fn failure_report() -> Report {
    Report::from_json(FAILURE_REPORT).unwrap()
}
