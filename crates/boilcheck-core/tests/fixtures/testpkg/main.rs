//! Exercise file for tagged-constant extraction.

//sqlboiler:check
// statics cannot participate in constant checking
static ONE: &str = "select * from users where user = $1;";

//sqlboiler:check
// concatenation must collapse into a single constant
const TWO: &str = concat!("select * from users;", "/");

const THREE: &str = "select * from videos;";

//sqlboiler:check
const FOUR: &str = "select * from tags;";

fn wrapped(r: DbResult) -> DbResult {
    r
}

fn main() {
    let db = Db::connect("nothing");
    let id = 5;
    let one = String::from("select * from users where user = $1;");
    let mut row_out = 0;

    // not tagged, and `one` is not a tagged constant: invisible
    let _ = db.Exec(one, id);

    //sqlboiler:check
    // a runtime value cannot be checked
    if let Err(err) = db.Exec(one, id) {
        log(err);
    }

    // TWO is tagged, so this untagged call is picked up
    if let Err(err) = db.Exec(TWO, id) {
        log(err);
    }

    // still found when wrapped
    let _ = wrapped(db.Exec(TWO, sql::NullBool { value: false, valid: true }));

    //sqlboiler:check
    // a plain constant works when the call itself is tagged
    let res = wrapped(db.Exec(THREE, id));
    log(res);

    //sqlboiler:check
    // inline literal, no assignment
    db.Exec("select * from logs;", sql::NullBool { value: false, valid: true });

    //sqlboiler:check
    // chained scan call
    db.QueryRow("select * from logs where id = $1;", id).Scan(&mut row_out);

    // context variant driven by the tagged constant
    db.QueryRowContext(ctx(), TWO, id).Scan(&mut row_out);

    //sqlboiler:check
    // inline constant expression, no assignment
    db.Exec(concat!("select * from ", "users;"), id);

    // FOUR is tagged at its declaration
    db.Exec(FOUR, id);

    //sqlboiler:check
    const FIVE: &str = "select * from comments;";

    //sqlboiler:check
    const SIX: &str = "select * from logins;";

    if let Err(err) = db.Exec(FIVE, id) {
        log(err);
    }

    db.Exec(SIX, id);
}
