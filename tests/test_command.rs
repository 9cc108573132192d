//! Integration tests for command execution against the scripted executor.
//!
//! Run with: cargo test --test test_command

use pldotnet_spi_bridge::executor::mock::{Call, FailOn, MockExecutor, ResultSet};
use pldotnet_spi_bridge::types::{oid, BaseType, DbType, RANGE_BAND};
use pldotnet_spi_bridge::{BridgeOptions, Connection, DataSource, Error, Parameter, Value};

#[test]
fn test_select_one_end_to_end() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("?column?", oid::INT4)]).row([Value::Int4(1)]));
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn.create_command("select 1").unwrap();
        let mut reader = cmd.execute_reader().unwrap();
        assert_eq!(reader.records_affected(), -1);
        assert!(reader.read().unwrap());
        assert_eq!(reader.get::<i32>(0).unwrap(), 1);
        assert!(!reader.read().unwrap());
    }

    let calls = conn.executor().calls();
    assert_eq!(calls[0], Call::Ready);
    assert_eq!(
        calls[1],
        Call::Prepare {
            sql: "select 1".to_string(),
            param_oids: vec![],
        }
    );
    assert_eq!(
        calls[2],
        Call::CursorOpen {
            sql: "select 1".to_string(),
            values: vec![],
        }
    );
    assert_eq!(calls.last(), Some(&Call::Finish));
    assert_eq!(conn.executor().finish_count(), 1);
}

#[test]
fn test_insert_returns_count_without_cursor() {
    let mut executor = MockExecutor::new();
    executor.push_affected(1);
    let mut conn = Connection::new(executor);

    let affected = conn
        .create_command("insert into t values (1)")
        .unwrap()
        .execute_non_query()
        .unwrap();
    assert_eq!(affected, 1);

    let executor = conn.executor();
    assert_eq!(
        executor.calls(),
        &[
            Call::Ready,
            Call::Execute {
                sql: "insert into t values (1)".to_string(),
                read_only: false,
                count: 0,
            },
            Call::Finish,
        ]
    );
    assert_eq!(executor.count_calls(|c| matches!(c, Call::CursorOpen { .. })), 0);
}

#[test]
fn test_non_query_through_reader() {
    let mut executor = MockExecutor::new();
    executor.push_affected(4);
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn.create_command("delete from t").unwrap();
        let mut reader = cmd.execute_reader().unwrap();
        assert_eq!(reader.records_affected(), 4);
        assert!(!reader.read().unwrap());
        assert_eq!(reader.field_count(), 0);
    }

    let executor = conn.executor();
    assert_eq!(executor.finish_count(), 1);
    assert_eq!(executor.count_calls(|c| matches!(c, Call::CursorOpen { .. })), 0);
    assert_eq!(executor.count_calls(|c| matches!(c, Call::CursorFetch)), 0);
}

#[test]
fn test_options_reach_the_executor() {
    let options = BridgeOptions::new().with_read_only(true).with_count_limit(10);
    let mut conn = Connection::with_options(MockExecutor::new(), options);
    conn.create_command("update t set x = 1")
        .unwrap()
        .execute_non_query()
        .unwrap();

    assert_eq!(
        conn.executor().calls()[1],
        Call::Execute {
            sql: "update t set x = 1".to_string(),
            read_only: true,
            count: 10,
        }
    );
}

#[test]
fn test_named_parameters_bind_in_order() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("sum", oid::INT4)]).row([Value::Int4(3)]));
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn
            .create_command("select @a + @b")
            .unwrap()
            .with_parameter("@a", 1)
            .with_parameter("@b", 2);
        assert_eq!(cmd.execute_scalar().unwrap(), Value::Int4(3));
        assert_eq!(cmd.text(), "select $1 + $2");
    }

    let calls = conn.executor().calls();
    assert_eq!(
        calls[1],
        Call::Prepare {
            sql: "select $1 + $2".to_string(),
            param_oids: vec![oid::INT4, oid::INT4],
        }
    );
    assert_eq!(
        calls[2],
        Call::CursorOpen {
            sql: "select $1 + $2".to_string(),
            values: vec![Value::Int4(1), Value::Int4(2)],
        }
    );
}

#[test]
fn test_reexecution_is_idempotent() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("n", oid::INT8)]).row([Value::Int8(5)]));
    executor.push_result(ResultSet::new([("n", oid::INT8)]).row([Value::Int8(6)]));
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn
            .create_command("select n from t where id = @id and id2 = @id2")
            .unwrap()
            .with_parameter("@id", 10i64)
            .with_parameter("@id2", 20i64);

        assert_eq!(cmd.execute_scalar().unwrap(), Value::Int8(5));
        cmd.parameters_mut().get_mut("id").unwrap().set_value(11i64);
        assert_eq!(cmd.execute_scalar().unwrap(), Value::Int8(6));
        assert_eq!(cmd.text(), "select n from t where id = $1 and id2 = $2");
    }

    let opens: Vec<&Call> = conn
        .executor()
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::CursorOpen { .. }))
        .collect();
    assert_eq!(
        opens[1],
        &Call::CursorOpen {
            sql: "select n from t where id = $1 and id2 = $2".to_string(),
            values: vec![Value::Int8(11), Value::Int8(20)],
        }
    );
    assert_eq!(conn.executor().finish_count(), 2);
}

#[test]
fn test_null_parameter_is_flagged() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("x", oid::TEXT)]));
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn.create_command("select x from t where x = $1").unwrap();
        cmd.parameters_mut()
            .add(Parameter::positional(Value::Null).with_type(DbType::Base(BaseType::Text)));
        assert_eq!(cmd.execute_scalar().unwrap(), Value::Null);
    }

    let calls = conn.executor().calls();
    assert_eq!(
        calls[1],
        Call::Prepare {
            sql: "select x from t where x = $1".to_string(),
            param_oids: vec![oid::TEXT],
        }
    );
    assert_eq!(
        calls[2],
        Call::CursorOpen {
            sql: "select x from t where x = $1".to_string(),
            values: vec![Value::Null],
        }
    );
}

#[test]
fn test_legacy_typed_parameter_resolves_range_oid() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("ok", oid::BOOL)]).row([Value::Bool(true)]));
    let mut conn = Connection::new(executor);
    {
        let mut cmd = conn.create_command("select @r @> 5").unwrap();
        let parameter = Parameter::named("@r", "[1,10)")
            .with_legacy_type(RANGE_BAND + BaseType::Integer.ordinal())
            .unwrap();
        cmd.parameters_mut().add(parameter);
        assert_eq!(cmd.execute_scalar().unwrap(), Value::Bool(true));
    }

    assert!(matches!(
        &conn.executor().calls()[1],
        Call::Prepare { sql, param_oids } if sql == "select $1 @> 5" && param_oids == &[3904]
    ));
}

#[test]
fn test_prepare_failure_releases_context() {
    let mut executor = MockExecutor::new();
    executor.fail_next(FailOn::Prepare, -6, "syntax error at or near \"selec\"");
    let mut conn = Connection::new(executor);

    let err = match conn.create_command("select from").unwrap().execute_reader() {
        Err(err) => err,
        Ok(_) => panic!("expected prepare failure"),
    };
    assert!(err.is_executor());
    assert_eq!(conn.executor().finish_count(), 1);
}

#[test]
fn test_cursor_open_failure_releases_context() {
    let mut executor = MockExecutor::new();
    executor.fail_next(FailOn::CursorOpen, -5, "cannot open cursor");
    let mut conn = Connection::new(executor);

    let result = conn
        .create_command("select 1")
        .unwrap()
        .execute_scalar();
    assert!(matches!(result, Err(Error::Executor { code: -5, .. })));

    let executor = conn.executor();
    assert_eq!(executor.count_calls(|c| matches!(c, Call::Prepare { .. })), 1);
    assert_eq!(executor.finish_count(), 1);
}

#[test]
fn test_execute_failure_releases_context() {
    let mut executor = MockExecutor::new();
    executor.fail_next(FailOn::Execute, -13, "relation \"t\" does not exist");
    let mut conn = Connection::new(executor);

    let result = conn
        .create_command("delete from t")
        .unwrap()
        .execute_non_query();
    assert!(result.unwrap_err().is_executor());
    assert_eq!(conn.executor().finish_count(), 1);
}

#[test]
fn test_unsupported_parameter_type_fails_before_executor() {
    let mut conn = Connection::new(MockExecutor::new());
    let result = conn
        .create_command("select @x")
        .unwrap()
        .with_parameter("@x", Value::array([Value::Null]))
        .execute_scalar();
    // Arrays with no typed element infer text[], which is supported.
    assert!(result.is_ok());

    let mut conn = Connection::new(MockExecutor::new());
    let mut cmd = conn.create_command("select @x").unwrap();
    cmd.parameters_mut()
        .add_typed("@x", DbType::Multirange(BaseType::Boolean), true);
    assert!(matches!(
        cmd.execute_scalar(),
        Err(Error::UnsupportedType { .. })
    ));
    drop(cmd);
    assert!(conn.executor().calls().is_empty());
}

#[test]
fn test_not_ready_executor() {
    let mut executor = MockExecutor::new();
    executor.set_ready(false);
    let mut conn = Connection::new(executor);

    let result = conn.create_command("select 1").unwrap().execute_scalar();
    assert!(result.unwrap_err().is_executor());
    assert_eq!(conn.executor().finish_count(), 0);
}

#[test]
fn test_data_source_connection() {
    let mut executor = MockExecutor::new();
    executor.push_result(ResultSet::new([("n", oid::TEXT)]).row([Value::Text("x".into())]));

    let source = DataSource::create("Host=localhost;Username=postgres;Command Count=3").unwrap();
    let mut conn = source.open_connection(executor).unwrap();
    assert_eq!(conn.options().count_limit, 3);

    let value = conn
        .create_command("SELECT n FROM t")
        .unwrap()
        .execute_scalar()
        .unwrap();
    assert_eq!(value, Value::Text("x".into()));
    // open() plus the command's own context.
    assert_eq!(
        conn.executor().count_calls(|c| matches!(c, Call::Ready)),
        2
    );
}
