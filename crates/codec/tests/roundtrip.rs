//! Encode/decode round trips and alignment across argument combinations.

use codec::{ArgType, Bundle, Message, Midi, TimeTag, Value, decode_packet};
use rstest::rstest;

fn every_type() -> Message {
    let mut msg = Message::new("/every/type");
    msg.append(-42)
        .append(3.5f32)
        .append(-0.125f64)
        .append(i64::MAX)
        .append("a string")
        .append_blob(&[0xde, 0xad, 0xbe, 0xef, 0x01])
        .append_midi(1, 0x90, 60, 127)
        .append_time_tag(TimeTag::from_parts(3_900_000_000, 1 << 30))
        .append(true)
        .append(false)
        .append('z')
        .append_null()
        .append_impulse();
    msg
}

#[test]
fn every_type_round_trips() -> eyre::Result<()> {
    let original = every_type();
    let decoded = Message::decode(&original.to_bytes())?;

    assert_eq!(decoded.address(), "/every/type");
    assert_eq!(decoded.type_tags(), ",ifdhsbmtTFcNI");
    assert_eq!(decoded, original);

    let values: Vec<Value<'_>> = decoded.args().map(|a| a.value()).collect();
    assert_eq!(
        values,
        vec![
            Value::Int32(-42),
            Value::Float32(3.5),
            Value::Float64(-0.125),
            Value::Int64(i64::MAX),
            Value::String("a string"),
            Value::Blob(&[0xde, 0xad, 0xbe, 0xef, 0x01]),
            Value::Midi(Midi::new(1, 0x90, 60, 127)),
            Value::TimeTag(TimeTag::from_parts(3_900_000_000, 1 << 30)),
            Value::Bool(true),
            Value::Bool(false),
            Value::Char('z'),
            Value::Null,
            Value::Impulse,
        ]
    );
    Ok(())
}

#[test]
fn decoded_message_can_be_extended() -> eyre::Result<()> {
    let mut decoded = Message::decode(&Message::new("/grow").with(1).to_bytes())?;
    decoded.append("more");
    let again = Message::decode(&decoded.to_bytes())?;
    assert_eq!(again.type_tags(), ",is");
    assert_eq!(again.arg(1)?.string()?, "more");
    Ok(())
}

#[rstest]
#[case::empty_string(Value::String(""))]
#[case::three_chars(Value::String("abc"))]
#[case::four_chars(Value::String("abcd"))]
#[case::empty_blob(Value::Blob(&[]))]
#[case::one_byte_blob(Value::Blob(&[1]))]
#[case::four_byte_blob(Value::Blob(&[1, 2, 3, 4]))]
#[case::bool(Value::Bool(true))]
#[case::null(Value::Null)]
#[case::int64(Value::Int64(-1))]
fn alignment_holds(#[case] value: Value<'static>) -> eyre::Result<()> {
    for address in ["/a", "/ab", "/abc", "/abcd"] {
        for count in 0..6 {
            let mut msg = Message::new(address);
            for _ in 0..count {
                msg.append(value);
            }
            let bytes = msg.to_bytes();
            assert_eq!(bytes.len() % 4, 0, "{address} x{count} {value:?}");
            assert_eq!(bytes.len(), msg.encoded_len());

            let decoded = Message::decode(&bytes)?;
            assert_eq!(decoded, msg);
            assert!(decoded.args().all(|a| a.arg_type() == value.arg_type()));

            let bundle = Bundle::new().with(&msg).with(&Bundle::new().with(&msg));
            assert_eq!(bundle.to_bytes().len() % 4, 0);
        }
    }
    Ok(())
}

#[test]
fn bundle_of_a_and_nested_b_c_decodes_in_order() -> eyre::Result<()> {
    let a = Message::new("/a").with(1);
    let b = Message::new("/b").with(2);
    let c = Message::new("/c").with(3);
    let bundle = Bundle::new().with(&a).with(&Bundle::new().with(&b).with(&c));

    let decoded = decode_packet(&bundle.to_bytes())?;
    let addresses: Vec<&str> = decoded.iter().map(Message::address).collect();
    assert_eq!(addresses, vec!["/a", "/b", "/c"]);
    assert_eq!(decoded, vec![a, b, c]);
    Ok(())
}

#[test]
fn blob_accessors_agree() -> eyre::Result<()> {
    let msg = Message::decode(&Message::new("/blob").with(&[5u8, 6, 7]).to_bytes())?;
    let arg = msg.arg(0)?;
    assert_eq!(arg.arg_type(), ArgType::Blob);
    assert_eq!(arg.blob()?.as_ref(), arg.blob_data()?);
    Ok(())
}
