mod common;

use common::{teacher_token, Sidecar, StubBackend};
use serde_json::json;

fn allocations() -> serde_json::Value {
    json!({
        "success": true,
        "data": [
            { "teacherId": "t1", "classId": { "_id": "c5", "name": "Grade 5" },
              "sectionId": { "_id": "c5a", "name": "A" }, "subjectId": { "_id": "m", "name": "Maths" } },
            { "teacherId": "t1", "classId": { "_id": "c5", "name": "Grade 5" },
              "sectionId": { "_id": "c5b", "name": "B" }, "subjectId": { "_id": "m", "name": "Maths" } },
            { "teacherId": "t1", "classId": { "_id": "c7", "name": "Grade 7" },
              "sectionId": { "_id": "c7a", "name": "A" }, "subjectId": { "_id": "m", "name": "Maths" } }
        ]
    })
}

#[test]
fn assignment_filters_cascade_and_create_refetches() {
    let stub = StubBackend::default();
    stub.route("GET", "/api/subject-allocation", 200, allocations());
    stub.route(
        "GET",
        "/api/assignments",
        200,
        json!({
            "success": true,
            "data": [
                { "_id": "a1", "title": "Fractions", "className": "Grade 5", "sectionName": "A",
                  "createdAt": "2025-03-10T23:59:59.999Z" },
                { "_id": "a2", "title": "Decimals", "className": "Grade 5", "sectionName": "B",
                  "createdAt": "2025-03-11T00:00:00Z" },
                { "_id": "a3", "title": "Angles", "className": "Grade 7", "sectionName": "A" }
            ]
        }),
    );
    stub.route("POST", "/api/assignments", 200, json!({ "success": true }));
    let mut sidecar = Sidecar::spawn(&stub.start());
    sidecar.request_ok("session.restore", json!({ "token": teacher_token() }));

    let page = sidecar.request_ok("assignments.load", json!({}));
    assert_eq!(page["total"], json!(3));
    assert_eq!(page["subject"], json!("Maths"));
    let alloc_query = &stub.received("GET", "/api/subject-allocation")[0].query;
    assert!(alloc_query.contains("institutionId=inst1"));
    assert!(alloc_query.contains("id=t1"));

    let page = sidecar.request_ok(
        "assignments.setFilter",
        json!({ "className": "Grade 5", "sectionName": "B" }),
    );
    assert_eq!(page["shown"], json!(1));
    let page = sidecar.request_ok("assignments.setFilter", json!({ "className": "Grade 7" }));
    assert_eq!(page["filter"]["sectionName"], json!(null));
    assert_eq!(page["shown"], json!(1));

    sidecar.request_ok("assignments.clearFilters", json!({}));
    let page = sidecar.request_ok(
        "assignments.setFilter",
        json!({ "dateFrom": "2025-03-10", "dateTo": "2025-03-10" }),
    );
    assert_eq!(page["shown"], json!(1));
    assert_eq!(page["assignments"][0]["id"], json!("a1"));

    let created = sidecar.request_ok(
        "assignments.create",
        json!({
            "title": "Ratios",
            "className": "Grade 7",
            "sectionName": "A",
            "dueDate": "2025-04-01",
            "description": "Worksheet 4"
        }),
    );
    assert_eq!(created["created"]["classId"], json!("c7"));
    let posted = stub.received("POST", "/api/assignments");
    assert_eq!(posted[0].body["total"], json!(0));
    assert_eq!(posted[0].body["submitted"], json!(0));
    assert_eq!(posted[0].body["status"], json!("not-completed"));
    assert_eq!(posted[0].body["createdBy"], json!("t1"));
    assert_eq!(stub.received("GET", "/api/assignments").len(), 2);
}

#[test]
fn exams_grid_saves_visible_page() {
    let stub = StubBackend::default();
    stub.route("GET", "/api/subject-allocation", 200, allocations());
    let students: Vec<serde_json::Value> = (0..12)
        .map(|i| {
            json!({ "_id": format!("s{i:02}"), "name": format!("Pupil {i:02}"),
                    "email": format!("p{i:02}@school.test"), "classId": "c5",
                    "className": "Grade 5", "sectionName": if i % 2 == 0 { "A" } else { "B" } })
        })
        .collect();
    stub.route(
        "GET",
        "/api/staff/portal/students",
        200,
        json!({ "success": true, "students": students }),
    );
    stub.route(
        "GET",
        "/api/staff/portal/exams",
        200,
        json!({ "success": true, "data": [
            { "_id": "e1", "name": "Unit Test", "classId": "c5", "className": "Grade 5", "totalMarks": 100 },
            { "_id": "e2", "name": "Art Show", "classId": "c9", "className": "Grade 9", "totalMarks": 20 }
        ]}),
    );
    stub.route(
        "GET",
        "/api/staff/portal/exams-schedules",
        200,
        json!({ "success": true, "data": [ { "examId": "e1", "subject": "Maths", "maxMarks": 25 } ] }),
    );
    stub.route(
        "GET",
        "/api/staff/portal/exams-marks",
        500,
        json!({ "success": false, "message": "marks service down" }),
    );
    stub.route("POST", "/api/exams-marks", 200, json!({ "success": true }));
    let mut sidecar = Sidecar::spawn(&stub.start());
    sidecar.request_ok("session.restore", json!({ "token": teacher_token() }));

    let overview = sidecar.request_ok("exams.load", json!({}));
    assert_eq!(overview["warnings"].as_array().map(Vec::len), Some(1));
    assert_eq!(overview["exams"][0]["canEnter"], json!(true));
    assert_eq!(overview["exams"][1]["canEnter"], json!(false));
    assert_eq!(overview["teaching"].as_array().map(Vec::len), Some(2));

    let grid = sidecar.request_ok("exams.select", json!({ "examId": "e1" }));
    assert_eq!(grid["grid"]["subject"], json!("Maths"));
    assert_eq!(grid["grid"]["maxMarks"], json!(25.0));
    assert_eq!(grid["grid"]["totalPages"], json!(2));

    let entered = sidecar.request_ok("exams.enterMark", json!({ "studentId": "s03", "value": 40 }));
    assert_eq!(entered["value"], json!(25.0));
    sidecar.request_ok("exams.setPage", json!({ "page": 2 }));
    sidecar.request_ok("exams.enterMark", json!({ "studentId": "s11", "value": "" }));

    let saved = sidecar.request_ok("exams.save", json!({}));
    assert_eq!(saved["saved"], json!(2));
    assert_eq!(saved["droppedEdits"], json!(1));
    let posted = stub.received("POST", "/api/exams-marks");
    let body = posted[0].body.as_array().cloned().unwrap_or_default();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["studentId"], json!("s10"));
    assert_eq!(body[1]["marksObtained"], json!(0.0));
    assert_eq!(body[1]["maxMarks"], json!(25.0));

    let other = sidecar.request_ok("exams.select", json!({ "examId": "e2" }));
    assert_eq!(other["assigned"], json!(false));
    let blocked = sidecar.request("exams.save", json!({}));
    assert_eq!(Sidecar::error_code(&blocked), "not_assigned");
    sidecar.request_ok("exams.close", json!({}));
    let none = sidecar.request("exams.grid", json!({}));
    assert_eq!(Sidecar::error_code(&none), "no_exam_selected");
}
