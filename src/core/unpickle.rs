//! Purpose: Pickle reader for legacy payloads that hold standard-library objects.
//! Exports: `read`.
//! Role: The opcode reader behind `legacy::decode`; runs only on payloads that failed JSON parsing.
//! Invariants: Only allowlisted globals are rebuilt; any other global fails naming `module.name`.
//! Invariants: Memoized containers are shared by id until the final value is resolved.
//! Notes: Python `datetime`/`date`/`time` objects pickle as packed byte states; see `date_state`.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, ToPrimitive};
use time::{Date, Duration, Month, PrimitiveDateTime, Time, UtcOffset};
use uuid::Uuid;

use crate::core::legacy::LegacyError;
use crate::core::value::{DateTime, Value};

const MAX_DEPTH: usize = 512;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Global {
    DateTime,
    Date,
    Time,
    TimeDelta,
    TimeZone,
    PytzUtc,
    Decimal,
    Uuid,
    SafeUuid,
    Encode,
    Reconstructor,
    Object,
    Set,
    FrozenSet,
}

#[derive(Clone, Debug)]
enum Item {
    None,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Item>),
    Tuple(Vec<Item>),
    Set(Vec<Item>),
    Dict(Vec<(Item, Item)>),
    Global(Global),
    // Instance created by NEWOBJ or `copyreg._reconstructor`, awaiting BUILD.
    Pending(Global),
    Offset(UtcOffset),
    Built(Value),
    Memo(u32),
}

/// Decodes a complete pickle, rebuilding allowlisted standard-library objects.
pub fn read(bytes: &[u8]) -> Result<Value, LegacyError> {
    let mut machine = Machine {
        input: Input { bytes, pos: 0 },
        stack: Vec::new(),
        marks: Vec::new(),
        memo: HashMap::new(),
    };
    let item = machine.run()?;
    into_value(machine.resolve(item, 0)?)
}

struct Input<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8, LegacyError> {
        Ok(self.take(1)?[0])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LegacyError> {
        let end = self.pos.checked_add(len).ok_or(LegacyError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(LegacyError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], LegacyError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32_len(&mut self) -> Result<usize, LegacyError> {
        usize::try_from(u32::from_le_bytes(self.array()?)).map_err(|_| LegacyError::Truncated)
    }

    fn u64_len(&mut self) -> Result<usize, LegacyError> {
        usize::try_from(u64::from_le_bytes(self.array()?)).map_err(|_| LegacyError::Truncated)
    }

    fn line(&mut self) -> Result<&'a [u8], LegacyError> {
        let rest = self.bytes.get(self.pos..).ok_or(LegacyError::Truncated)?;
        let end = rest
            .iter()
            .position(|byte| *byte == b'\n')
            .ok_or(LegacyError::Truncated)?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn text_line(&mut self) -> Result<&'a str, LegacyError> {
        std::str::from_utf8(self.line()?).map_err(|_| LegacyError::Corrupt("non-ascii text line"))
    }
}

struct Machine<'a> {
    input: Input<'a>,
    stack: Vec<Item>,
    marks: Vec<usize>,
    memo: HashMap<u32, Item>,
}

impl Machine<'_> {
    fn run(&mut self) -> Result<Item, LegacyError> {
        loop {
            let opcode = self.input.byte()?;
            match opcode {
                b'.' => return self.pop(),
                0x80 => {
                    self.input.byte()?;
                }
                0x95 => {
                    self.input.take(8)?;
                }
                b'(' => self.marks.push(self.stack.len()),
                b'0' => {
                    self.pop()?;
                }
                b'1' => {
                    self.pop_mark()?;
                }
                b'2' => {
                    let top = self.stack.last().cloned().ok_or(underflow())?;
                    self.stack.push(top);
                }

                b'N' => self.stack.push(Item::None),
                0x88 => self.stack.push(Item::Bool(true)),
                0x89 => self.stack.push(Item::Bool(false)),
                b'I' => {
                    let item = match self.input.text_line()? {
                        "01" => Item::Bool(true),
                        "00" => Item::Bool(false),
                        digits => parse_int(digits)?,
                    };
                    self.stack.push(item);
                }
                b'L' => {
                    let line = self.input.text_line()?;
                    let item = parse_int(line.strip_suffix('L').unwrap_or(line))?;
                    self.stack.push(item);
                }
                b'J' => {
                    let number = i32::from_le_bytes(self.input.array()?);
                    self.stack.push(Item::Int(i64::from(number)));
                }
                b'K' => {
                    let number = self.input.byte()?;
                    self.stack.push(Item::Int(i64::from(number)));
                }
                b'M' => {
                    let number = u16::from_le_bytes(self.input.array()?);
                    self.stack.push(Item::Int(i64::from(number)));
                }
                0x8a => {
                    let len = usize::from(self.input.byte()?);
                    let digits = self.input.take(len)?;
                    self.stack.push(long_item(digits));
                }
                0x8b => {
                    let len = self.input.u32_len()?;
                    let digits = self.input.take(len)?;
                    self.stack.push(long_item(digits));
                }
                b'F' => {
                    let number = self.input.text_line()?.trim().parse::<f64>();
                    let number = number.map_err(|_| LegacyError::Corrupt("float literal"))?;
                    self.stack.push(Item::Float(number));
                }
                b'G' => {
                    let number = f64::from_be_bytes(self.input.array()?);
                    self.stack.push(Item::Float(number));
                }

                b'X' => {
                    let len = self.input.u32_len()?;
                    let text = utf8(self.input.take(len)?)?;
                    self.stack.push(text);
                }
                0x8c => {
                    let len = usize::from(self.input.byte()?);
                    let text = utf8(self.input.take(len)?)?;
                    self.stack.push(text);
                }
                0x8d => {
                    let len = self.input.u64_len()?;
                    let text = utf8(self.input.take(len)?)?;
                    self.stack.push(text);
                }
                b'V' => {
                    let text = raw_unicode_escape(self.input.line()?)?;
                    self.stack.push(Item::Str(text));
                }
                b'S' => {
                    let bytes = string_literal(self.input.line()?)?;
                    self.stack.push(Item::Bytes(bytes));
                }
                b'T' => {
                    let len = self.input.u32_len()?;
                    let bytes = self.input.take(len)?.to_vec();
                    self.stack.push(Item::Bytes(bytes));
                }
                b'U' | b'C' => {
                    let len = usize::from(self.input.byte()?);
                    let bytes = self.input.take(len)?.to_vec();
                    self.stack.push(Item::Bytes(bytes));
                }
                b'B' => {
                    let len = self.input.u32_len()?;
                    let bytes = self.input.take(len)?.to_vec();
                    self.stack.push(Item::Bytes(bytes));
                }
                0x8e | 0x96 => {
                    let len = self.input.u64_len()?;
                    let bytes = self.input.take(len)?.to_vec();
                    self.stack.push(Item::Bytes(bytes));
                }

                b')' => self.stack.push(Item::Tuple(Vec::new())),
                b't' => {
                    let items = self.pop_mark()?;
                    self.stack.push(Item::Tuple(items));
                }
                0x85..=0x87 => {
                    let len = usize::from(opcode - 0x84);
                    let start = self.stack.len().checked_sub(len).ok_or(underflow())?;
                    let items = self.stack.split_off(start);
                    self.stack.push(Item::Tuple(items));
                }
                b']' => self.stack.push(Item::List(Vec::new())),
                b'l' => {
                    let items = self.pop_mark()?;
                    self.stack.push(Item::List(items));
                }
                b'a' => {
                    let item = self.pop()?;
                    match self.top_mut()? {
                        Item::List(items) => items.push(item),
                        _ => return Err(LegacyError::Corrupt("append target is not a list")),
                    }
                }
                b'e' => {
                    let new_items = self.pop_mark()?;
                    match self.top_mut()? {
                        Item::List(items) => items.extend(new_items),
                        _ => return Err(LegacyError::Corrupt("append target is not a list")),
                    }
                }
                b'}' => self.stack.push(Item::Dict(Vec::new())),
                b'd' => {
                    let items = self.pop_mark()?;
                    self.stack.push(Item::Dict(pairs(items)?));
                }
                b's' => {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    match self.top_mut()? {
                        Item::Dict(entries) => entries.push((key, value)),
                        _ => return Err(LegacyError::Corrupt("setitem target is not a dict")),
                    }
                }
                b'u' => {
                    let new_entries = pairs(self.pop_mark()?)?;
                    match self.top_mut()? {
                        Item::Dict(entries) => entries.extend(new_entries),
                        _ => return Err(LegacyError::Corrupt("setitem target is not a dict")),
                    }
                }
                0x8f => self.stack.push(Item::Set(Vec::new())),
                0x90 => {
                    let new_items = self.pop_mark()?;
                    match self.top_mut()? {
                        Item::Set(items) => items.extend(new_items),
                        _ => return Err(LegacyError::Corrupt("additems target is not a set")),
                    }
                }
                0x91 => {
                    let items = self.pop_mark()?;
                    self.stack.push(Item::Set(items));
                }

                b'p' => {
                    let id = memo_id(self.input.text_line()?)?;
                    self.put(id)?;
                }
                b'q' => {
                    let id = u32::from(self.input.byte()?);
                    self.put(id)?;
                }
                b'r' => {
                    let id = u32::from_le_bytes(self.input.array()?);
                    self.put(id)?;
                }
                0x94 => {
                    let id = u32::try_from(self.memo.len()).map_err(|_| LegacyError::Corrupt("memo overflow"))?;
                    self.put(id)?;
                }
                b'g' => {
                    let id = memo_id(self.input.text_line()?)?;
                    self.get(id)?;
                }
                b'h' => {
                    let id = u32::from(self.input.byte()?);
                    self.get(id)?;
                }
                b'j' => {
                    let id = u32::from_le_bytes(self.input.array()?);
                    self.get(id)?;
                }

                b'c' => {
                    let module = self.input.text_line()?;
                    let name = self.input.text_line()?;
                    self.stack.push(Item::Global(lookup(module, name)?));
                }
                0x93 => {
                    let name = self.pop_resolved()?;
                    let module = self.pop_resolved()?;
                    let (Item::Str(module), Item::Str(name)) = (module, name) else {
                        return Err(LegacyError::Corrupt("stack global operands are not strings"));
                    };
                    self.stack.push(Item::Global(lookup(&module, &name)?));
                }
                b'R' => {
                    let args = self.pop_resolved()?;
                    let callable = self.pop_resolved()?;
                    let (Item::Global(global), Item::Tuple(args)) = (callable, args) else {
                        return Err(LegacyError::Corrupt("reduce expects a global and a tuple"));
                    };
                    self.stack.push(reduce(global, args)?);
                }
                0x81 => {
                    let args = self.pop_resolved()?;
                    let class = self.pop_resolved()?;
                    self.stack.push(new_object(class, args)?);
                }
                0x92 => {
                    self.pop()?;
                    let args = self.pop_resolved()?;
                    let class = self.pop_resolved()?;
                    self.stack.push(new_object(class, args)?);
                }
                b'b' => {
                    let state = self.pop_resolved()?;
                    let target = self.top_mut()?;
                    let built = match &*target {
                        Item::Pending(Global::Uuid) => uuid_from_state(state)?,
                        _ => return Err(LegacyError::Unsupported("object state")),
                    };
                    *target = built;
                }
                other => return Err(LegacyError::Opcode(other)),
            }
        }
    }

    fn pop(&mut self) -> Result<Item, LegacyError> {
        if self.marks.last().is_some_and(|mark| *mark >= self.stack.len()) {
            return Err(underflow());
        }
        self.stack.pop().ok_or(underflow())
    }

    fn pop_resolved(&mut self) -> Result<Item, LegacyError> {
        let item = self.pop()?;
        self.resolve(item, 0)
    }

    fn pop_mark(&mut self) -> Result<Vec<Item>, LegacyError> {
        let mark = self.marks.pop().ok_or(LegacyError::Corrupt("missing mark"))?;
        if mark > self.stack.len() {
            return Err(underflow());
        }
        Ok(self.stack.split_off(mark))
    }

    // Moves the top of the stack into the memo so later mutations stay visible to every reference.
    fn put(&mut self, id: u32) -> Result<(), LegacyError> {
        let top = self.stack.last_mut().ok_or(underflow())?;
        let item = std::mem::replace(top, Item::Memo(id));
        if matches!(item, Item::Memo(existing) if existing == id) {
            return Ok(());
        }
        self.memo.insert(id, item);
        Ok(())
    }

    fn get(&mut self, id: u32) -> Result<(), LegacyError> {
        if !self.memo.contains_key(&id) {
            return Err(LegacyError::Corrupt("missing memo entry"));
        }
        self.stack.push(Item::Memo(id));
        Ok(())
    }

    fn top_mut(&mut self) -> Result<&mut Item, LegacyError> {
        let memo_ref = match self.stack.last() {
            Some(Item::Memo(id)) => Some(*id),
            Some(_) => None,
            None => return Err(underflow()),
        };
        let Some(mut id) = memo_ref else {
            return self.stack.last_mut().ok_or(underflow());
        };
        let mut hops = 0;
        while let Some(Item::Memo(next)) = self.memo.get(&id) {
            id = *next;
            hops += 1;
            if hops > MAX_DEPTH {
                return Err(LegacyError::Corrupt("memo reference cycle"));
            }
        }
        self.memo
            .get_mut(&id)
            .ok_or(LegacyError::Corrupt("missing memo entry"))
    }

    fn resolve(&self, item: Item, depth: usize) -> Result<Item, LegacyError> {
        if depth > MAX_DEPTH {
            return Err(LegacyError::Unsupported("recursive structure"));
        }
        let next = depth + 1;
        Ok(match item {
            Item::Memo(id) => {
                let inner = self
                    .memo
                    .get(&id)
                    .cloned()
                    .ok_or(LegacyError::Corrupt("missing memo entry"))?;
                self.resolve(inner, next)?
            }
            Item::List(items) => Item::List(self.resolve_all(items, next)?),
            Item::Tuple(items) => Item::Tuple(self.resolve_all(items, next)?),
            Item::Set(items) => Item::Set(self.resolve_all(items, next)?),
            Item::Dict(entries) => Item::Dict(
                entries
                    .into_iter()
                    .map(|(key, value)| -> Result<(Item, Item), LegacyError> {
                        Ok((self.resolve(key, next)?, self.resolve(value, next)?))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            other => other,
        })
    }

    fn resolve_all(&self, items: Vec<Item>, depth: usize) -> Result<Vec<Item>, LegacyError> {
        items.into_iter().map(|item| self.resolve(item, depth)).collect()
    }
}

fn lookup(module: &str, name: &str) -> Result<Global, LegacyError> {
    Ok(match (module, name) {
        ("datetime", "datetime") => Global::DateTime,
        ("datetime", "date") => Global::Date,
        ("datetime", "time") => Global::Time,
        ("datetime", "timedelta") => Global::TimeDelta,
        ("datetime", "timezone") => Global::TimeZone,
        ("pytz", "_UTC") => Global::PytzUtc,
        ("decimal", "Decimal") => Global::Decimal,
        ("uuid", "UUID") => Global::Uuid,
        ("uuid", "SafeUUID") => Global::SafeUuid,
        ("_codecs", "encode") => Global::Encode,
        ("copy_reg" | "copyreg", "_reconstructor") => Global::Reconstructor,
        ("__builtin__" | "builtins", "object") => Global::Object,
        ("__builtin__" | "builtins", "set") => Global::Set,
        ("__builtin__" | "builtins", "frozenset") => Global::FrozenSet,
        _ => return Err(LegacyError::Global(format!("{module}.{name}"))),
    })
}

fn reduce(global: Global, mut args: Vec<Item>) -> Result<Item, LegacyError> {
    match global {
        Global::Encode => match args.as_slice() {
            [Item::Str(text), Item::Str(encoding)] if is_latin1(encoding) => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)))
                .collect::<Result<Vec<_>, _>>()
                .map(Item::Bytes)
                .map_err(|_| LegacyError::Corrupt("latin-1 text out of range")),
            _ => Err(LegacyError::Unsupported("_codecs.encode arguments")),
        },
        Global::Date => match args.as_slice() {
            [Item::Bytes(state)] => Ok(Item::Built(Value::Date(date_state(state)?))),
            _ => Err(LegacyError::Unsupported("date arguments")),
        },
        Global::DateTime => {
            let tz = if args.len() == 2 { args.pop() } else { None };
            let [Item::Bytes(state)] = args.as_slice() else {
                return Err(LegacyError::Unsupported("datetime arguments"));
            };
            let ts = datetime_state(state)?;
            let value = match tz {
                None | Some(Item::None) => DateTime::Naive(ts),
                Some(Item::Offset(offset)) => DateTime::Offset(ts.assume_offset(offset)),
                Some(_) => return Err(LegacyError::Unsupported("datetime tzinfo")),
            };
            Ok(Item::Built(Value::DateTime(value)))
        }
        Global::Time => match args.as_slice() {
            [Item::Bytes(state)] | [Item::Bytes(state), Item::None] => {
                Ok(Item::Built(Value::Time(time_state(state)?)))
            }
            _ => Err(LegacyError::Unsupported("time arguments")),
        },
        Global::TimeDelta => {
            let parts = args
                .iter()
                .map(|arg| match arg {
                    Item::Int(number) => Ok(*number),
                    _ => Err(LegacyError::Unsupported("timedelta arguments")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let [days, seconds, micros] = parts.as_slice() else {
                return Err(LegacyError::Unsupported("timedelta arguments"));
            };
            let duration = Duration::days(*days)
                .checked_add(Duration::seconds(*seconds))
                .and_then(|sum| sum.checked_add(Duration::microseconds(*micros)))
                .ok_or(LegacyError::Unsupported("timedelta range"))?;
            Ok(Item::Built(Value::Duration(duration)))
        }
        Global::TimeZone => match args.first() {
            Some(Item::Built(Value::Duration(delta))) if delta.subsec_nanoseconds() == 0 => {
                i32::try_from(delta.whole_seconds())
                    .ok()
                    .and_then(|seconds| UtcOffset::from_whole_seconds(seconds).ok())
                    .map(Item::Offset)
                    .ok_or(LegacyError::Unsupported("timezone offset"))
            }
            _ => Err(LegacyError::Unsupported("timezone arguments")),
        },
        Global::PytzUtc => Ok(Item::Offset(UtcOffset::UTC)),
        Global::Decimal => {
            let text = match args.as_slice() {
                [Item::Str(text)] => text.clone(),
                [Item::Bytes(bytes)] => String::from_utf8(bytes.clone())
                    .map_err(|_| LegacyError::Corrupt("decimal text is not utf-8"))?,
                _ => return Err(LegacyError::Unsupported("decimal arguments")),
            };
            BigDecimal::from_str(text.trim())
                .map(|decimal| Item::Built(Value::Decimal(decimal)))
                .map_err(|_| LegacyError::Unsupported("non-finite decimal"))
        }
        Global::SafeUuid => Ok(Item::None),
        Global::Reconstructor => match args.first() {
            Some(Item::Global(Global::Uuid)) => Ok(Item::Pending(Global::Uuid)),
            _ => Err(LegacyError::Unsupported("reconstructed class")),
        },
        Global::Set | Global::FrozenSet => match args.pop() {
            None => Ok(Item::Set(Vec::new())),
            Some(Item::List(items) | Item::Tuple(items) | Item::Set(items)) => Ok(Item::Set(items)),
            Some(_) => Err(LegacyError::Unsupported("set arguments")),
        },
        Global::Uuid => Err(LegacyError::Unsupported("uuid arguments")),
        Global::Object => Err(LegacyError::Unsupported("bare object")),
    }
}

fn new_object(class: Item, args: Item) -> Result<Item, LegacyError> {
    match (class, args) {
        (Item::Global(Global::Uuid), Item::Tuple(args)) if args.is_empty() => {
            Ok(Item::Pending(Global::Uuid))
        }
        (Item::Global(global), Item::Tuple(args)) => reduce(global, args),
        _ => Err(LegacyError::Corrupt("newobj expects a class and a tuple")),
    }
}

fn uuid_from_state(state: Item) -> Result<Item, LegacyError> {
    let Item::Dict(entries) = state else {
        return Err(LegacyError::Unsupported("uuid state"));
    };
    let number = entries.into_iter().find_map(|(key, value)| match key {
        Item::Str(name) if name == "int" => Some(value),
        _ => None,
    });
    let bits = match number {
        Some(Item::Int(number)) => u128::try_from(number).ok(),
        Some(Item::BigInt(number)) => number.to_u128(),
        _ => None,
    };
    bits.map(|bits| Item::Built(Value::Uuid(Uuid::from_u128(bits))))
        .ok_or(LegacyError::Unsupported("uuid state"))
}

// Packed states: date is year(2, big-endian) month day; time is hour minute second micro(3).
// The high bit of the month or hour byte carries `fold` and is ignored.
fn date_state(state: &[u8]) -> Result<Date, LegacyError> {
    let [year_hi, year_lo, month, day] = state else {
        return Err(LegacyError::Unsupported("date state"));
    };
    calendar_date(*year_hi, *year_lo, *month, *day)
}

fn time_state(state: &[u8]) -> Result<Time, LegacyError> {
    let [hour, minute, second, micro @ ..] = state else {
        return Err(LegacyError::Unsupported("time state"));
    };
    clock_time(*hour, *minute, *second, micro)
}

fn datetime_state(state: &[u8]) -> Result<PrimitiveDateTime, LegacyError> {
    let [year_hi, year_lo, month, day, hour, minute, second, micro @ ..] = state else {
        return Err(LegacyError::Unsupported("datetime state"));
    };
    let date = calendar_date(*year_hi, *year_lo, *month, *day)?;
    let time = clock_time(*hour, *minute, *second, micro)?;
    Ok(PrimitiveDateTime::new(date, time))
}

fn calendar_date(year_hi: u8, year_lo: u8, month: u8, day: u8) -> Result<Date, LegacyError> {
    let year = i32::from(year_hi) * 256 + i32::from(year_lo);
    let month = Month::try_from(month & 0x7f).map_err(|_| LegacyError::Unsupported("date state"))?;
    Date::from_calendar_date(year, month, day).map_err(|_| LegacyError::Unsupported("date state"))
}

fn clock_time(hour: u8, minute: u8, second: u8, micro: &[u8]) -> Result<Time, LegacyError> {
    let [a, b, c] = micro else {
        return Err(LegacyError::Unsupported("time state"));
    };
    let micros = (u32::from(*a) << 16) | (u32::from(*b) << 8) | u32::from(*c);
    Time::from_hms_micro(hour & 0x7f, minute, second, micros)
        .map_err(|_| LegacyError::Unsupported("time state"))
}

fn into_value(item: Item) -> Result<Value, LegacyError> {
    Ok(match item {
        Item::None => Value::Null,
        Item::Bool(flag) => Value::Bool(flag),
        Item::Int(number) => Value::Int(number),
        Item::BigInt(number) => Value::Decimal(BigDecimal::from(number)),
        Item::Float(number) => Value::Float(number),
        Item::Str(text) => Value::String(text),
        Item::Bytes(bytes) => {
            Value::List(bytes.into_iter().map(|byte| Value::Int(i64::from(byte))).collect())
        }
        Item::List(items) | Item::Tuple(items) | Item::Set(items) => {
            Value::List(items.into_iter().map(into_value).collect::<Result<_, _>>()?)
        }
        Item::Dict(entries) => {
            let mut out = BTreeMap::new();
            for (key, value) in entries {
                out.insert(dict_key(key)?, into_value(value)?);
            }
            Value::Map(out)
        }
        Item::Built(value) => value,
        Item::Offset(_) => return Err(LegacyError::Unsupported("bare tzinfo")),
        Item::Global(_) | Item::Pending(_) => return Err(LegacyError::Unsupported("class object")),
        Item::Memo(_) => return Err(LegacyError::Corrupt("unresolved memo reference")),
    })
}

fn dict_key(key: Item) -> Result<String, LegacyError> {
    match key {
        Item::Str(text) => Ok(text),
        Item::Int(number) => Ok(number.to_string()),
        Item::BigInt(number) => Ok(number.to_string()),
        Item::Float(number) => Ok(number.to_string()),
        Item::Bool(flag) => Ok(flag.to_string()),
        Item::None => Ok("null".to_string()),
        _ => Err(LegacyError::Unsupported("dict key")),
    }
}

fn pairs(items: Vec<Item>) -> Result<Vec<(Item, Item)>, LegacyError> {
    if items.len() % 2 != 0 {
        return Err(LegacyError::Corrupt("odd number of dict items"));
    }
    let mut out = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        out.push((key, value));
    }
    Ok(out)
}

// LONG1/LONG4 payloads are little-endian two's complement.
fn long_item(digits: &[u8]) -> Item {
    let number = BigInt::from_signed_bytes_le(digits);
    match number.to_i64() {
        Some(small) => Item::Int(small),
        None => Item::BigInt(number),
    }
}

fn parse_int(text: &str) -> Result<Item, LegacyError> {
    let text = text.trim();
    if let Ok(small) = text.parse::<i64>() {
        return Ok(Item::Int(small));
    }
    BigInt::from_str(text)
        .map(Item::BigInt)
        .map_err(|_| LegacyError::Corrupt("integer literal"))
}

fn memo_id(text: &str) -> Result<u32, LegacyError> {
    text.trim()
        .parse()
        .map_err(|_| LegacyError::Corrupt("memo id"))
}

fn utf8(bytes: &[u8]) -> Result<Item, LegacyError> {
    String::from_utf8(bytes.to_vec())
        .map(Item::Str)
        .map_err(|_| LegacyError::Corrupt("string is not utf-8"))
}

fn is_latin1(encoding: &str) -> bool {
    matches!(encoding.to_ascii_lowercase().as_str(), "latin1" | "latin-1" | "iso-8859-1")
}

// Protocol 0 `UNICODE`: latin-1 bytes with `\uXXXX` and `\UXXXXXXXX` escapes.
fn raw_unicode_escape(line: &[u8]) -> Result<String, LegacyError> {
    let mut out = String::with_capacity(line.len());
    let mut index = 0;
    while index < line.len() {
        let byte = line[index];
        let width = match (byte, line.get(index + 1)) {
            (b'\\', Some(b'u')) => 4,
            (b'\\', Some(b'U')) => 8,
            _ => {
                out.push(char::from(byte));
                index += 1;
                continue;
            }
        };
        let digits = line
            .get(index + 2..index + 2 + width)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .ok_or(LegacyError::Corrupt("unicode escape"))?;
        let ch = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LegacyError::Corrupt("unicode escape"))?;
        out.push(ch);
        index += 2 + width;
    }
    Ok(out)
}

// Protocol 0 `STRING`: a quoted Python 2 `repr` of a byte string.
fn string_literal(line: &[u8]) -> Result<Vec<u8>, LegacyError> {
    let body = match line {
        [b'\'', body @ .., b'\''] | [b'"', body @ .., b'"'] => body,
        _ => return Err(LegacyError::Corrupt("string literal quotes")),
    };
    let mut out = Vec::with_capacity(body.len());
    let mut iter = body.iter().copied();
    while let Some(byte) = iter.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        let escaped = iter.next().ok_or(LegacyError::Corrupt("string escape"))?;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'x' => {
                let hex = [
                    iter.next().ok_or(LegacyError::Corrupt("string escape"))?,
                    iter.next().ok_or(LegacyError::Corrupt("string escape"))?,
                ];
                let digits = std::str::from_utf8(&hex).map_err(|_| LegacyError::Corrupt("string escape"))?;
                let value = u8::from_str_radix(digits, 16).map_err(|_| LegacyError::Corrupt("string escape"))?;
                out.push(value);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn underflow() -> LegacyError {
    LegacyError::Corrupt("stack underflow")
}
