//! Built-in rule and section files, used when the user has none.

use crate::rules::{RuleParseError, RuleSet};
use crate::sections::{SectionConfig, SectionParseError};

pub const DEFAULT_RULES: &str = r#"# Classification rules
# Format: CONDITIONS[modifier]... -> bucket,calc_type
#
#   category=X, subcategory=Y, or both separated by a comma
#   [months>=N] [months>=N%] [count<=N] [total>N] [cv>N] [max>N] [max_avg_ratio>N]
#
# Buckets: excluded, travel, annual, periodic, monthly, one_off, variable
# Calc types: avg (over active months), /12 (spread over a year), auto (by cv)
# First matching rule wins.

# Not spending
category=Transfers -> excluded,/12
category=Cash -> excluded,/12
category=Income -> excluded,/12

category=Travel -> travel,/12

# Annual
category=Bills,subcategory=Insurance[months<=2][count<=2] -> annual,/12
category=Bills,subcategory=Tax[months<=2] -> annual,/12
category=Bills,subcategory=Membership[months<=2] -> annual,/12
category=Family,subcategory=Charity -> annual,/12
category=Charity,subcategory=Donation -> annual,/12

# Periodic
category=Education,subcategory=Tuition -> periodic,/12
category=Bills,subcategory=Insurance[months>=3] -> periodic,/12
category=Health,subcategory=Medical[months>=2] -> periodic,/12
category=Health,subcategory=Dental[months>=2] -> periodic,/12
category=Health,subcategory=Orthodontics[months>=2] -> periodic,/12
category=Bills[total>5000][cv>0.8][max_avg_ratio>3] -> periodic,/12
category=Education[total>5000][cv>0.8][max_avg_ratio>3] -> periodic,/12
category=Health[total>5000][cv>0.8][max_avg_ratio>3] -> periodic,/12

# Monthly
category=Bills[months>=50%] -> monthly,auto
category=Utilities[months>=50%] -> monthly,auto
category=Subscriptions[months>=50%] -> monthly,auto
category=Home,subcategory=Lawn[months>=75%] -> monthly,auto
category=Home,subcategory=Security[months>=75%] -> monthly,auto
category=Home,subcategory=Cleaning[months>=75%] -> monthly,auto
category=Health,subcategory=Gym[months>=75%] -> monthly,auto
category=Health,subcategory=Fitness[months>=75%] -> monthly,auto
category=Health,subcategory=Pharmacy[months>=75%] -> monthly,auto
category=Food,subcategory=Grocery[months>=75%] -> monthly,auto
category=Food,subcategory=Delivery[months>=75%] -> monthly,auto
category=Transport,subcategory=Gas[months>=75%] -> monthly,auto
category=Transport,subcategory=Parking[months>=75%] -> monthly,auto
category=Transport,subcategory=Transit[months>=75%] -> monthly,auto
category=Personal,subcategory=Childcare[months>=75%] -> monthly,auto
category=Personal,subcategory=Services[months>=75%] -> monthly,auto
category=Personal,subcategory=Grooming[months>=75%] -> monthly,auto

# One-off
subcategory=Procedure -> one_off,/12
category=Shopping[months<=3][total>1000] -> one_off,/12
category=Home[months<=3][total>1000] -> one_off,/12
category=Personal[months<=3][total>1000] -> one_off,/12
subcategory=Improvement[months<=3][total>1000] -> one_off,/12
subcategory=Appliance[months<=3][total>1000] -> one_off,/12
subcategory=HVAC[months<=3][total>1000] -> one_off,/12
subcategory=Repair[months<=3][total>1000] -> one_off,/12
subcategory=Furniture[months<=3][total>1000] -> one_off,/12
subcategory=Electronics[months<=3][total>1000] -> one_off,/12
subcategory=Jewelry[months<=3][total>1000] -> one_off,/12
subcategory=Luxury[months<=3][total>1000] -> one_off,/12

# Frequent and steady
[months>=50%][cv<0.3] -> variable,avg

* -> variable,/12
"#;

pub const DEFAULT_SECTIONS: &str = r#"# Sections
# Each [Section] is a view over merchants; a merchant may appear in several.
# Filters use expression syntax: == for equality, and/or/not, in.

[Total]
filter: True

[Bills]
filter: category == "Bills" and months >= 6

[Subscriptions]
filter: category == "Subscriptions"

[Groceries]
filter: subcategory == "Grocery"

[Dining]
filter: subcategory == "Restaurant" or subcategory == "Fast Food" or subcategory == "Delivery"

[Travel]
filter: category == "Travel"

[Shopping]
filter: category == "Shopping"

[Health]
filter: category == "Health"

[Big Purchases]
filter: sum(payments) > 1000 and months <= 3
"#;

pub fn default_rules() -> Result<RuleSet, RuleParseError> {
    RuleSet::parse(DEFAULT_RULES)
}

pub fn default_sections() -> Result<SectionConfig, SectionParseError> {
    SectionConfig::parse(DEFAULT_SECTIONS)
}
